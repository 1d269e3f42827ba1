//! Browser session plumbing: launch Chromium with a persisted profile, or
//! attach to an already-authenticated browser over CDP, and expose the
//! words page to the engine as a [`WordsDom`].

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::Handler;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tracing::{info, warn};

use crate::engine::dom::{ClickTarget, RawItem, WordsDom};

pub const WORDS_URL: &str = "https://www.duolingo.com/practice-hub/words";
pub const DEFAULT_CDP_ENDPOINT: &str = "http://127.0.0.1:9222";

const PROFILE_DIR: &str = "data/chrome-profile";
const AUTH_MARKER: &str = "data/chrome-profile/.auth-confirmed";
const MARKUP_POLL: Duration = Duration::from_millis(500);

/// All rendered list items, matched by shape: list items under a section,
/// first heading-level child + first paragraph child. The page generates
/// randomized class names on every load, so class- or path-based selectors
/// would break; element roles and nesting are the only stable signal.
const ITEMS_JS: &str = r#"
(() => {
  const items = document.querySelectorAll('section ul li');
  return Array.from(items).map((li) => {
    try {
      const h = li.querySelector('h1,h2,h3,h4,h5,h6');
      const p = li.querySelector('p');
      return {
        term: h ? h.textContent : null,
        translation: p ? p.textContent : null,
      };
    } catch (e) {
      return { term: null, translation: null };
    }
  });
})()
"#;

const HEADINGS_JS: &str = r#"
(() => Array.from(document.querySelectorAll('h1,h2,h3,h4')).map((h) => h.textContent || ''))()
"#;

const SCROLL_JS: &str = "window.scrollTo(0, document.body.scrollHeight)";

const MARKUP_PRESENT_JS: &str = "document.querySelector('section ul li h3') !== null";

/// An authenticated words-page session. Holds the `Browser` so the CDP
/// connection stays alive for as long as the dom is in use.
pub struct Session {
    browser: Browser,
    owned: bool,
    pub dom: ChromiumWordsDom,
}

impl Session {
    /// Close the browser if we launched it; an attached external browser is
    /// only disconnected.
    pub async fn close(mut self) -> Result<()> {
        if self.owned {
            let _ = self.browser.close().await;
        }
        Ok(())
    }
}

/// Open the words page, authenticated, via one of two postures:
/// attach to an external CDP browser when `endpoint` is given, otherwise
/// launch headful Chromium with a persisted profile (interactive login on
/// the first run). Fails with user guidance if the word-list markup never
/// appears within `markup_timeout`.
pub async fn open_words_page(
    endpoint: Option<&str>,
    markup_timeout: Duration,
) -> Result<Session> {
    match endpoint {
        Some(endpoint) => attach(endpoint, markup_timeout).await,
        None => launch_with_profile(markup_timeout).await,
    }
}

async fn attach(endpoint: &str, markup_timeout: Duration) -> Result<Session> {
    let ws_url = discover_ws_url(endpoint).await?;
    let (browser, handler) = Browser::connect(ws_url)
        .await
        .with_context(|| format!("failed to attach to browser at {}", endpoint))?;
    spawn_handler(handler);

    // Reuse a tab already on the words page if one exists.
    let mut page = None;
    for candidate in browser.pages().await? {
        if let Ok(Some(url)) = candidate.url().await {
            if url.starts_with(WORDS_URL) {
                info!("Reusing existing words tab");
                page = Some(candidate);
                break;
            }
        }
    }
    let page = match page {
        Some(p) => p,
        None => {
            let p = browser.new_page(WORDS_URL).await?;
            let _ = p.wait_for_navigation().await;
            p
        }
    };

    let dom = ChromiumWordsDom { page };
    wait_for_word_list(&dom, markup_timeout).await.context(
        "Couldn't find the word list. Make sure you're logged into Duolingo in the \
         CDP browser window and that the Words page is fully loaded.",
    )?;

    Ok(Session {
        browser,
        owned: false,
        dom,
    })
}

async fn launch_with_profile(markup_timeout: Duration) -> Result<Session> {
    let first_run = !Path::new(AUTH_MARKER).exists();
    std::fs::create_dir_all(PROFILE_DIR).context("failed to create profile directory")?;

    let mut builder = BrowserConfig::builder()
        .with_head()
        .user_data_dir(PROFILE_DIR);
    if let Some(chrome) = find_chrome() {
        builder = builder.chrome_executable(chrome);
    }
    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

    let (browser, handler) = Browser::launch(config)
        .await
        .context("failed to launch Chromium; set DUO_CHROME_PATH if it is not on PATH")?;
    spawn_handler(handler);

    let page = browser.new_page(WORDS_URL).await?;
    let _ = page.wait_for_navigation().await;

    let dom = ChromiumWordsDom { page };

    if first_run {
        println!(
            "\nA browser window should now be open.\n\
             1) Log in to Duolingo (use 'Continue with Google' for SSO).\n\
             2) After login, you should end up on the Practice Hub 'Words' page.\n\
             3) Wait until the list of words is visible.\n\
             4) Then return here and press Enter so the session can be saved.\n"
        );
        wait_for_enter().await?;
    }

    wait_for_word_list(&dom, markup_timeout).await.context(
        "Couldn't find the word list after login. Make sure you're logged into \
         Duolingo and the Words page has finished loading, then re-run.",
    )?;

    if first_run {
        std::fs::write(AUTH_MARKER, b"").context("failed to persist session marker")?;
        info!("Saved authenticated session profile under {}", PROFILE_DIR);
    }

    Ok(Session {
        browser,
        owned: true,
        dom,
    })
}

/// Poll for the item markup as proof of an authenticated, fully loaded
/// page. The engine never enters credentials; it only waits.
async fn wait_for_word_list(dom: &ChromiumWordsDom, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let present: bool = dom
            .page
            .evaluate(MARKUP_PRESENT_JS)
            .await
            .ok()
            .and_then(|v| v.into_value().ok())
            .unwrap_or(false);
        if present {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!(
                "word-list markup did not appear within {:.0?}",
                timeout
            );
        }
        tokio::time::sleep(MARKUP_POLL).await;
    }
}

/// Resolve the websocket debugger URL from a CDP http endpoint.
async fn discover_ws_url(endpoint: &str) -> Result<String> {
    if endpoint.starts_with("ws") {
        return Ok(endpoint.to_string());
    }
    let url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    let version: serde_json::Value = reqwest::get(&url)
        .await
        .with_context(|| format!("CDP endpoint unreachable: {}", endpoint))?
        .json()
        .await
        .context("CDP endpoint returned invalid JSON")?;
    version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .context("CDP endpoint reported no webSocketDebuggerUrl")
}

fn spawn_handler(mut handler: Handler) {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            let _ = event;
        }
    });
}

/// Locate a Chromium binary: DUO_CHROME_PATH env first, then PATH.
fn find_chrome() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("DUO_CHROME_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        warn!("DUO_CHROME_PATH is set but does not exist: {}", p);
    }

    let names = ["google-chrome", "chromium", "chromium-browser", "chrome"];
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        for name in names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

async fn wait_for_enter() -> Result<()> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| ())
    })
    .await
    .context("stdin reader task failed")?
    .context("failed to read confirmation from stdin")
}

/// [`WordsDom`] over a live Chromium page.
pub struct ChromiumWordsDom {
    page: Page,
}

#[async_trait]
impl WordsDom for ChromiumWordsDom {
    async fn rendered_items(&self) -> Result<Vec<RawItem>> {
        let result = self
            .page
            .evaluate(ITEMS_JS)
            .await
            .context("failed to query rendered items")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("unexpected item query result: {e:?}"))
    }

    async fn heading_texts(&self) -> Result<Vec<String>> {
        let result = self
            .page
            .evaluate(HEADINGS_JS)
            .await
            .context("failed to query headings")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("unexpected heading query result: {e:?}"))
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        let _ = self
            .page
            .evaluate(SCROLL_JS)
            .await
            .context("failed to scroll page")?;
        Ok(())
    }

    async fn click_first(&self, target: ClickTarget) -> Result<bool> {
        let js = click_js(target);
        let result = self
            .page
            .evaluate(js)
            .await
            .context("failed to run click strategy")?;
        // The snippets catch their own lookup errors and report false.
        Ok(result.into_value().unwrap_or(false))
    }

    async fn settle(&self, wait: Duration) {
        tokio::time::sleep(wait).await;
    }
}

fn click_js(target: ClickTarget) -> String {
    match target {
        ClickTarget::ButtonByAccessibleName(needle) => format!(
            r#"
(() => {{
  try {{
    const needle = '{needle}'.toLowerCase();
    for (const el of document.querySelectorAll("button, [role='button']")) {{
      const name = (el.getAttribute('aria-label') || el.textContent || '').toLowerCase();
      if (!name.includes(needle) || el.disabled) continue;
      el.click();
      return true;
    }}
    return false;
  }} catch (e) {{ return false; }}
}})()
"#
        ),
        ClickTarget::ButtonByText(needle) => format!(
            r#"
(() => {{
  try {{
    for (const el of document.querySelectorAll('button')) {{
      if (!(el.textContent || '').includes('{needle}')) continue;
      if (el.disabled || el.offsetParent === null) continue;
      el.click();
      return true;
    }}
    return false;
  }} catch (e) {{ return false; }}
}})()
"#
        ),
        ClickTarget::TextInListSection(needle) => format!(
            r#"
(() => {{
  try {{
    const probe = document.querySelector('section ul li h3');
    const section = probe ? probe.closest('section') : null;
    if (!section) return false;
    const needle = '{needle}'.toLowerCase();
    const walker = document.createTreeWalker(section, NodeFilter.SHOW_TEXT);
    let node;
    while ((node = walker.nextNode())) {{
      if (!node.textContent.toLowerCase().includes(needle)) continue;
      const parent = node.parentElement;
      const target = parent && parent.closest("button, a, [role='button'], [onclick]");
      if (!target) continue;
      target.click();
      return true;
    }}
    return false;
  }} catch (e) {{ return false; }}
}})()
"#
        ),
    }
}
