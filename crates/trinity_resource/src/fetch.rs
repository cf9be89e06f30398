//! Fetchers - the platform I/O boundary
//!
//! A [`Fetcher`] turns a url into bytes and reports back through a callback.
//! The callback may run synchronously, later on the same thread, or on any
//! other thread: the registry only forwards the result into a channel that
//! the frame loop drains, so no render state is touched from I/O context.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use crate::error::FetchError;

/// Completion callback handed to a fetcher
pub type FetchCallback = Box<dyn FnOnce(Result<Vec<u8>, FetchError>) + Send>;

/// Source of raw resource bytes
pub trait Fetcher: Send + Sync {
    /// Start fetching `url`; `callback` must eventually be called exactly once
    fn fetch(&self, url: &str, callback: FetchCallback);
}

/// In-memory url table, completes immediately
#[derive(Default)]
pub struct MemoryFetcher {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the bytes served for `url`
    pub fn insert(&self, url: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.write().insert(url.into(), data.into());
    }

    /// Stop serving `url`
    pub fn remove(&self, url: &str) -> Option<Vec<u8>> {
        self.files.write().remove(url)
    }

    /// Every url requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Number of times `url` was requested
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| u.as_str() == url).count()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str, callback: FetchCallback) {
        self.requests.lock().push(url.to_string());
        let result = self
            .files
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()));
        callback(result);
    }
}

/// Reads files below a root directory
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    /// Serve files relative to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, url: &str, callback: FetchCallback) {
        let full = self.root.join(url);
        let result = std::fs::read(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(url.to_string()),
            _ => FetchError::Io {
                url: url.to_string(),
                message: e.to_string(),
            },
        });
        log::debug!("FileFetcher: read {:?} ({})", full, if result.is_ok() { "ok" } else { "failed" });
        callback(result);
    }
}

/// Holds requests until they are completed by hand
///
/// Models network latency: nothing arrives until `complete`, `complete_next`
/// or `fail` is called.
#[derive(Default)]
pub struct DeferredFetcher {
    pending: Mutex<VecDeque<(String, FetchCallback)>>,
}

impl DeferredFetcher {
    /// Create a fetcher with no pending requests
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests waiting for completion
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Urls waiting for completion, oldest first
    pub fn pending_urls(&self) -> Vec<String> {
        self.pending.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    fn take(&self, url: &str) -> Vec<FetchCallback> {
        let mut pending = self.pending.lock();
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(pending.len());
        for (u, callback) in pending.drain(..) {
            if u == url {
                taken.push(callback);
            } else {
                kept.push_back((u, callback));
            }
        }
        *pending = kept;
        taken
    }

    /// Complete every pending request for `url` with `data`
    ///
    /// Returns the number of requests completed.
    pub fn complete(&self, url: &str, data: &[u8]) -> usize {
        let callbacks = self.take(url);
        let count = callbacks.len();
        for callback in callbacks {
            callback(Ok(data.to_vec()));
        }
        count
    }

    /// Complete the oldest pending request with `data`
    pub fn complete_next(&self, data: &[u8]) -> Option<String> {
        let (url, callback) = self.pending.lock().pop_front()?;
        callback(Ok(data.to_vec()));
        Some(url)
    }

    /// Fail every pending request for `url`
    pub fn fail(&self, url: &str, error: FetchError) -> usize {
        let callbacks = self.take(url);
        let count = callbacks.len();
        for callback in callbacks {
            callback(Err(error.clone()));
        }
        count
    }
}

impl Fetcher for DeferredFetcher {
    fn fetch(&self, url: &str, callback: FetchCallback) {
        self.pending.lock().push_back((url.to_string(), callback));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn capture() -> (FetchCallback, Arc<Mutex<Vec<Result<Vec<u8>, FetchError>>>>) {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        (Box::new(move |r| sink.lock().push(r)), results)
    }

    #[test]
    fn test_memory_fetcher() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("a.png", vec![1, 2, 3]);

        let (callback, results) = capture();
        fetcher.fetch("a.png", callback);
        let (callback, _) = capture();
        fetcher.fetch("missing.png", callback);

        assert_eq!(results.lock()[0], Ok(vec![1, 2, 3]));
        assert_eq!(fetcher.request_count("a.png"), 1);
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[test]
    fn test_deferred_fetcher() {
        let fetcher = DeferredFetcher::new();
        let (first, results) = capture();
        let (second, other) = capture();
        fetcher.fetch("a.geo", first);
        fetcher.fetch("b.geo", second);

        assert!(results.lock().is_empty());
        assert_eq!(fetcher.pending_urls(), vec!["a.geo", "b.geo"]);

        assert_eq!(fetcher.complete("a.geo", &[9]), 1);
        assert_eq!(results.lock()[0], Ok(vec![9]));

        assert_eq!(fetcher.fail("b.geo", FetchError::Cancelled("b.geo".into())), 1);
        assert!(other.lock()[0].is_err());
        assert_eq!(fetcher.pending_count(), 0);
    }

    #[test]
    fn test_file_fetcher_missing() {
        let fetcher = FileFetcher::new(std::env::temp_dir());
        let (callback, results) = capture();
        fetcher.fetch("trinity-does-not-exist/nothing.png", callback);
        assert_eq!(
            results.lock()[0],
            Err(FetchError::NotFound("trinity-does-not-exist/nothing.png".into()))
        );
    }
}
