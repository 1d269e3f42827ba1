pub mod dom;
pub mod expected;
pub mod extract;
pub mod reveal;

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use dom::{TermPair, WordsDom};

/// Consecutive zero-delta rounds tolerated before declaring a stall.
/// Covers transient rendering delays without risking an infinite loop.
const STALL_TOLERANCE: u32 = 3;

/// Extra scroll-and-wait when no reveal control was found and the expected
/// total is unknown, giving slow lazy-loads one more chance per round.
const COURTESY_SETTLE: Duration = Duration::from_millis(1500);

/// How the collection loop ended. Advisory only: both outcomes hand the
/// accumulator to the sinks unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Accumulator reached the expected total.
    Done,
    /// No new pairs for `STALL_TOLERANCE` consecutive rounds.
    Stalled,
}

/// Final result of one collection run.
pub struct Harvest {
    pub pairs: BTreeSet<TermPair>,
    pub outcome: Outcome,
    pub rounds: u32,
    pub expected: Option<u64>,
}

/// Run the collection loop to convergence.
///
/// Each round extracts the currently rendered pairs, merges them into the
/// accumulator, then either stops (expected total reached, or stalled) or
/// drives the page to reveal more. The expected total is an untrusted
/// page-scraped signal; the stagnation check is the real safety net and
/// fires whether or not the total is known.
pub async fn collect(dom: &dyn WordsDom, expected: Option<u64>) -> Result<Harvest> {
    let mut pairs: BTreeSet<TermPair> = BTreeSet::new();
    let mut stagnant_rounds = 0u32;
    let mut rounds = 0u32;

    let pb = expected.map(|n| {
        let pb = ProgressBar::new(n);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} words")
                .expect("static template")
                .progress_chars("=> "),
        );
        pb
    });

    let outcome = loop {
        rounds += 1;
        let added = extract::merge_rendered(dom, &mut pairs).await?;
        let total = pairs.len();

        if let Some(pb) = &pb {
            pb.set_position(total as u64);
        }
        match expected {
            Some(n) => info!("Round {}: collected {} (+{}) / {}", rounds, total, added, n),
            None => info!("Round {}: collected {} (+{}) / unknown", rounds, total, added),
        }

        // Count-based stop: short-circuits before any further reveal.
        if let Some(n) = expected {
            if total as u64 >= n {
                break Outcome::Done;
            }
        }

        if added == 0 {
            stagnant_rounds += 1;
            if stagnant_rounds >= STALL_TOLERANCE {
                warn!(
                    "No new pairs after {} consecutive rounds; stopping",
                    stagnant_rounds
                );
                break Outcome::Stalled;
            }
        } else {
            stagnant_rounds = 0;
        }

        let acted = reveal::try_reveal_more(dom).await?;
        if !acted && expected.is_none() {
            // Courtesy retry: without a target count there is no other way
            // to distinguish "end of list" from "still rendering". Does not
            // touch the stagnation counter.
            dom.scroll_to_bottom().await?;
            dom.settle(COURTESY_SETTLE).await;
        }
    };

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if let Some(n) = expected {
        if pairs.len() as u64 != n {
            warn!(
                "Collected {} pairs but the page claimed {}; emitting partial results",
                pairs.len(),
                n
            );
        }
    }

    Ok(Harvest {
        pairs,
        outcome,
        rounds,
        expected,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::dom::{ClickTarget, RawItem};
    use super::*;

    fn item(term: &str, translation: &str) -> RawItem {
        RawItem {
            term: Some(term.to_string()),
            translation: Some(translation.to_string()),
        }
    }

    /// Scripted page: extraction pass `i` sees `script[i]` (the last entry
    /// repeats once the script runs out). Clicks always "succeed" or always
    /// fail, and every interaction is counted.
    struct FakeDom {
        script: Vec<Vec<RawItem>>,
        click_succeeds: bool,
        extracts: Mutex<usize>,
        clicks: Mutex<usize>,
        scrolls: Mutex<usize>,
    }

    impl FakeDom {
        fn new(script: Vec<Vec<RawItem>>, click_succeeds: bool) -> Self {
            Self {
                script,
                click_succeeds,
                extracts: Mutex::new(0),
                clicks: Mutex::new(0),
                scrolls: Mutex::new(0),
            }
        }

        fn extract_count(&self) -> usize {
            *self.extracts.lock().unwrap()
        }

        fn scroll_count(&self) -> usize {
            *self.scrolls.lock().unwrap()
        }
    }

    #[async_trait]
    impl WordsDom for FakeDom {
        async fn rendered_items(&self) -> anyhow::Result<Vec<RawItem>> {
            let mut n = self.extracts.lock().unwrap();
            let idx = (*n).min(self.script.len().saturating_sub(1));
            *n += 1;
            Ok(self.script.get(idx).cloned().unwrap_or_default())
        }

        async fn heading_texts(&self) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn scroll_to_bottom(&self) -> anyhow::Result<()> {
            *self.scrolls.lock().unwrap() += 1;
            Ok(())
        }

        async fn click_first(&self, _target: ClickTarget) -> anyhow::Result<bool> {
            *self.clicks.lock().unwrap() += 1;
            Ok(self.click_succeeds)
        }

        async fn settle(&self, _wait: Duration) {}
    }

    #[tokio::test]
    async fn reaches_expected_and_stops_without_another_reveal() {
        let dom = FakeDom::new(
            vec![
                vec![item("a", "one"), item("b", "two")],
                vec![item("a", "one"), item("b", "two"), item("c", "three"), item("d", "four")],
            ],
            true,
        );
        let harvest = collect(&dom, Some(4)).await.unwrap();

        assert_eq!(harvest.outcome, Outcome::Done);
        assert_eq!(harvest.pairs.len(), 4);
        assert_eq!(harvest.rounds, 2);
        // The driver scrolls once per invocation: only round 1 revealed.
        assert_eq!(dom.scroll_count(), 1);
    }

    #[tokio::test]
    async fn overshoot_counts_as_done() {
        let dom = FakeDom::new(
            vec![vec![item("a", "one"), item("b", "two"), item("c", "three")]],
            true,
        );
        let harvest = collect(&dom, Some(2)).await.unwrap();
        assert_eq!(harvest.outcome, Outcome::Done);
        assert_eq!(harvest.pairs.len(), 3);
        assert_eq!(harvest.rounds, 1);
    }

    #[tokio::test]
    async fn stalls_after_three_stagnant_rounds() {
        // Same two items forever; expected total never reached.
        let dom = FakeDom::new(vec![vec![item("a", "one"), item("b", "two")]], true);
        let harvest = collect(&dom, Some(100)).await.unwrap();

        assert_eq!(harvest.outcome, Outcome::Stalled);
        assert_eq!(harvest.pairs.len(), 2);
        // Round 1 adds, rounds 2-4 stagnate; no 4th stagnant round runs.
        assert_eq!(dom.extract_count(), 4);
    }

    #[tokio::test]
    async fn stalls_without_expected_total() {
        let dom = FakeDom::new(vec![Vec::new()], false);
        let harvest = collect(&dom, None).await.unwrap();

        assert_eq!(harvest.outcome, Outcome::Stalled);
        assert!(harvest.pairs.is_empty());
        assert_eq!(dom.extract_count(), 3);
    }

    #[tokio::test]
    async fn courtesy_scroll_only_when_expected_unknown() {
        // Two continuing rounds before the stall; clicks never succeed.
        let script = vec![
            vec![item("a", "one")],
            vec![item("a", "one"), item("b", "two")],
        ];

        let unknown = FakeDom::new(script.clone(), false);
        collect(&unknown, None).await.unwrap();
        // Each non-terminal round: 1 driver scroll + 1 courtesy scroll.
        let unknown_scrolls = unknown.scroll_count();

        let known = FakeDom::new(script, false);
        collect(&known, Some(100)).await.unwrap();
        let known_scrolls = known.scroll_count();

        assert_eq!(unknown_scrolls, 2 * known_scrolls);
    }

    #[tokio::test]
    async fn merge_is_idempotent_and_monotonic() {
        let dom = FakeDom::new(
            vec![
                vec![item("b", "two"), item("a", "one")],
                vec![item("a", "one"), item("b", "two")],
                vec![item("b", "two"), item("c", "three")],
            ],
            true,
        );
        let mut pairs = BTreeSet::new();

        let added1 = extract::merge_rendered(&dom, &mut pairs).await.unwrap();
        assert_eq!(added1, 2);
        let added2 = extract::merge_rendered(&dom, &mut pairs).await.unwrap();
        assert_eq!(added2, 0);
        assert_eq!(pairs.len(), 2);
        let added3 = extract::merge_rendered(&dom, &mut pairs).await.unwrap();
        assert_eq!(added3, 1);
        assert_eq!(pairs.len(), 3);
    }

    #[tokio::test]
    async fn invalid_items_never_enter_accumulator() {
        let dom = FakeDom::new(
            vec![vec![
                item("a", "one"),
                item("  ", "blank term"),
                item("blank translation", ""),
                RawItem { term: None, translation: Some("no heading".into()) },
            ]],
            false,
        );
        let harvest = collect(&dom, Some(1)).await.unwrap();
        assert_eq!(harvest.pairs.len(), 1);
        assert!(harvest.pairs.contains(&TermPair::new("a", "one")));
    }
}
