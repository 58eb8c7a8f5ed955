//! Common utilities shared by drivers and workflows
//!
//! Polling with backoff and session-artifact handling.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::future::Future;
use std::time::{Duration, Instant};

// ============================================================================
// Polling Utilities
// ============================================================================

/// Configuration for polling operations
#[derive(Clone)]
pub struct PollConfig {
    pub timeout_ms: u64,
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub use_exponential_backoff: bool,
}

impl PollConfig {
    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Default::default()
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10000,
            initial_interval_ms: 100,
            max_interval_ms: 500,
            use_exponential_backoff: true,
        }
    }
}

/// Generic polling function with optional exponential backoff
///
/// Calls `check_fn` repeatedly until it returns `Ok(true)` or timeout is reached.
/// The condition is always checked at least once. Errors from `check_fn` abort
/// the poll.
pub async fn wait_until<F, Fut>(check_fn: F, config: PollConfig) -> Result<bool>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut interval = config.initial_interval_ms;

    loop {
        if check_fn().await? {
            return Ok(true);
        }
        if start.elapsed() >= timeout {
            return Ok(false);
        }

        tokio::time::sleep(Duration::from_millis(interval)).await;

        if config.use_exponential_backoff {
            interval = (interval * 3 / 2).min(config.max_interval_ms);
        }
    }
}

// ============================================================================
// Session Artifacts
// ============================================================================

/// Browser storage state as saved by Playwright (`storageState()`)
#[derive(Debug, Deserialize)]
struct StorageState {
    #[serde(default)]
    origins: Vec<OriginState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OriginState {
    origin: String,
    #[serde(default)]
    local_storage: Vec<StorageEntry>,
}

#[derive(Debug, Deserialize)]
struct StorageEntry {
    name: String,
    value: String,
}

/// Build the init script that restores a saved session.
///
/// A Playwright storage-state JSON restores each origin's `localStorage`
/// entries when a page of that origin loads. Any other content is taken to be
/// a script already.
pub fn session_init_script(artifact: &str) -> Result<String> {
    let trimmed = artifact.trim_start();
    if !trimmed.starts_with('{') {
        return Ok(artifact.to_string());
    }

    let state: StorageState =
        serde_json::from_str(artifact).context("Invalid storage state JSON")?;

    let mut script = String::new();
    for origin in state.origins {
        if origin.local_storage.is_empty() {
            continue;
        }
        let entries: Vec<[String; 2]> = origin
            .local_storage
            .into_iter()
            .map(|e| [e.name, e.value])
            .collect();
        script.push_str(&format!(
            "if (window.location.origin === {}) {{ for (const [k, v] of {}) {{ window.localStorage.setItem(k, v); }} }}\n",
            serde_json::to_string(&origin.origin)?,
            serde_json::to_string(&entries)?,
        ));
    }
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_storage_state_script() {
        let state = r#"{
            "cookies": [],
            "origins": [
                {
                    "origin": "http://localhost:4200",
                    "localStorage": [{ "name": "auth-token", "value": "abc\"123" }]
                },
                { "origin": "http://other", "localStorage": [] }
            ]
        }"#;

        let script = session_init_script(state).unwrap();
        assert_eq!(script.lines().count(), 1);
        assert!(script.contains(r#"window.location.origin === "http://localhost:4200""#));
        assert!(script.contains(r#"[["auth-token","abc\"123"]]"#));
    }

    #[test]
    fn test_plain_script_passes_through() {
        let script = "window.localStorage.setItem('auth-token', 'x');";
        assert_eq!(session_init_script(script).unwrap(), script);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(session_init_script("{ not json").is_err());
    }

    #[tokio::test]
    async fn test_wait_until_succeeds_after_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let config = PollConfig {
            timeout_ms: 1000,
            initial_interval_ms: 1,
            max_interval_ms: 5,
            use_exponential_backoff: true,
        };

        let met = wait_until(
            || async move { Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2) },
            config,
        )
        .await
        .unwrap();

        assert!(met);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let met = wait_until(|| async { Ok(false) }, PollConfig::with_timeout(20))
            .await
            .unwrap();
        assert!(!met);
    }
}
