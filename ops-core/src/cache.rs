//! cache.rs
//!
//! Write-once JSON memoization on disk. Account resolution is slow (it pages
//! Organizations) and its output changes rarely, so each tool caches the
//! resolved set under the shared state directory and refreshes it only when
//! the file is older than a max age or the user asks for `--refresh-cache`.

use crate::logging::state_dir;
use eyre::{Result, WrapErr};
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Cache rooted at `<state dir>/cache`.
    pub fn open_default() -> Self {
        Self::new(state_dir().join("cache"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Return the cached value for `key` if present and younger than
    /// `max_age`; otherwise run `fetch`, persist its output, and return it.
    ///
    /// A corrupt or unreadable cache file counts as a miss.
    pub async fn load_or_fetch<T, F, Fut>(&self, key: &str, max_age: Duration, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let path = self.path_for(key);
        if let Some(cached) = load_fresh(&path, max_age) {
            debug!("cache hit for '{key}' at {}", path.display());
            return Ok(cached);
        }

        debug!("cache miss for '{key}'; fetching");
        let value = fetch().await?;
        self.store(&path, &value)?;
        Ok(value)
    }

    /// Drop the cached value for `key`. Missing file is fine.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).wrap_err_with(|| format!("removing cache file {}", path.display())),
        }
    }

    // Temp-file + rename so a crash mid-write never leaves a torn file.
    fn store<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root)
            .wrap_err_with(|| format!("creating cache dir {}", self.root.display()))?;
        let json = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).wrap_err_with(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).wrap_err_with(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }
}

fn load_fresh<T: DeserializeOwned>(path: &Path, max_age: Duration) -> Option<T> {
    let meta = fs::metadata(path).ok()?;
    let age = meta.modified().ok()?.elapsed().unwrap_or(Duration::MAX);
    if age > max_age {
        debug!("cache file {} is stale ({age:?})", path.display());
        return None;
    }
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("ignoring corrupt cache file {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        value: String,
    }

    fn payload(v: &str) -> Payload {
        Payload { value: v.to_string() }
    }

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn fetches_and_persists_on_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());

        let got: Payload = cache
            .load_or_fetch("accounts", DAY, || async { Ok(payload("one")) })
            .await
            .unwrap();
        assert_eq!(got, payload("one"));
        assert!(dir.path().join("accounts.json").exists());
    }

    #[tokio::test]
    async fn serves_fresh_value_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let got: Payload = cache
                .load_or_fetch("accounts", DAY, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(payload("one"))
                })
                .await
                .unwrap();
            assert_eq!(got, payload("one"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_file_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());

        let _: Payload = cache
            .load_or_fetch("accounts", DAY, || async { Ok(payload("old")) })
            .await
            .unwrap();
        let got: Payload = cache
            .load_or_fetch("accounts", Duration::ZERO, || async { Ok(payload("new")) })
            .await
            .unwrap();
        assert_eq!(got, payload("new"));
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        fs::write(dir.path().join("accounts.json"), "not json {").unwrap();

        let got: Payload = cache
            .load_or_fetch("accounts", DAY, || async { Ok(payload("fresh")) })
            .await
            .unwrap();
        assert_eq!(got, payload("fresh"));
    }

    #[tokio::test]
    async fn invalidate_forces_next_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());

        let _: Payload = cache
            .load_or_fetch("accounts", DAY, || async { Ok(payload("one")) })
            .await
            .unwrap();
        cache.invalidate("accounts").unwrap();
        let got: Payload = cache
            .load_or_fetch("accounts", DAY, || async { Ok(payload("two")) })
            .await
            .unwrap();
        assert_eq!(got, payload("two"));
    }

    #[test]
    fn invalidate_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        cache.invalidate("nothing-here").unwrap();
    }

    #[tokio::test]
    async fn fetch_error_propagates_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());

        let got: Result<Payload> = cache
            .load_or_fetch("accounts", DAY, || async { eyre::bail!("org is down") })
            .await;
        assert!(got.is_err());
        assert!(!dir.path().join("accounts.json").exists());
    }
}
