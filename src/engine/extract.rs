use std::collections::BTreeSet;

use anyhow::Result;

use super::dom::{RawItem, TermPair, WordsDom};

/// Validate one structural match. A container missing either child, or
/// whose text trims to empty, yields nothing.
pub fn valid_pair(item: &RawItem) -> Option<TermPair> {
    let term = item.term.as_deref()?.trim();
    let translation = item.translation.as_deref()?.trim();
    if term.is_empty() || translation.is_empty() {
        return None;
    }
    Some(TermPair::new(term, translation))
}

/// Extract the currently rendered pairs and merge them into the
/// accumulator. Returns how many pairs were new this pass.
pub async fn merge_rendered(
    dom: &dyn WordsDom,
    collected: &mut BTreeSet<TermPair>,
) -> Result<usize> {
    let items = dom.rendered_items().await?;
    let mut added = 0;
    for item in &items {
        if let Some(pair) = valid_pair(item) {
            if collected.insert(pair) {
                added += 1;
            }
        }
    }
    Ok(added)
}

// ── Tests ──
