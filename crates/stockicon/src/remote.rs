//! Remote avatar images.
//!
//! Avatars are fetched on the network runtime and handed back through a
//! completion queue that the UI thread drains with
//! [`RemoteImageCache::process_completed`]. Loader state only changes while
//! the queue is drained, so the `completed` signal is the one point where a
//! loader's image becomes readable.
//!
//! Each (identity, size, scale) combination is its own entry both in memory
//! and on disk.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use stockicon_core::logging::{span_names, targets};
use stockicon_core::Signal;
use stockicon_net::NetworkError;
use stockicon_net::http::HttpClient;
use stockicon_render::DiskImageCache;
use tracing::Instrument;

use crate::cache::ResolvedImage;
use crate::config::RemoteImageConfig;
use crate::error::{IconError, Result};
use crate::loader;

/// Hash of the normalized (trimmed, lower-cased) identity.
pub fn avatar_hash(identity: &str) -> String {
    let digest = Sha256::digest(identity.trim().to_lowercase().as_bytes());
    format!("{digest:x}")
}

/// Cache key for an avatar of `pixels` device pixels at `scale`.
pub fn cache_key(hash: &str, pixels: u32, scale: u32) -> String {
    if scale == 1 {
        format!("{hash}@{pixels}x{pixels}")
    } else {
        format!("{hash}@{pixels}x{pixels}x{scale}")
    }
}

/// Fetches raw bytes for a URL.
pub trait RemoteFetcher: Send + Sync {
    /// Start fetching `url`.
    fn fetch(&self, url: &str) -> BoxFuture<'static, std::result::Result<Vec<u8>, NetworkError>>;
}

/// [`RemoteFetcher`] over the HTTP client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    /// Wrap an existing client.
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Build a client with the given request timeout.
    pub fn with_timeout(timeout: Duration) -> std::result::Result<Self, NetworkError> {
        Ok(Self::new(HttpClient::builder().timeout(timeout).build()?))
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, std::result::Result<Vec<u8>, NetworkError>> {
        let request = self.client.get(url);
        async move {
            let response = request.send().await?.error_for_status()?;
            if !response.is_image() {
                return Err(NetworkError::Request(format!(
                    "expected an image, got '{}'",
                    response.content_type().unwrap_or_default()
                )));
            }
            Ok(response.bytes().await?.to_vec())
        }
        .boxed()
    }
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct LoaderState {
    downloading: bool,
    image: Option<ResolvedImage>,
}

/// One keyed remote image.
///
/// While a fetch is in flight [`is_downloading`](Self::is_downloading) is
/// `true`. When it finishes, [`completed`](Self::completed) is emitted on the
/// thread that drains the cache's completion queue.
pub struct RemoteImageLoader {
    key: String,
    url: String,
    pixels: u32,
    state: Mutex<LoaderState>,
    completed: Signal<()>,
}

impl RemoteImageLoader {
    fn new(key: String, url: String, pixels: u32) -> Self {
        Self {
            key,
            url,
            pixels,
            state: Mutex::new(LoaderState::default()),
            completed: Signal::new(),
        }
    }

    /// Cache key of this loader.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// URL the image is fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requested size in device pixels.
    pub fn pixels(&self) -> u32 {
        self.pixels
    }

    /// Whether a fetch is in flight.
    pub fn is_downloading(&self) -> bool {
        self.state.lock().downloading
    }

    /// The image, once loaded.
    pub fn image(&self) -> Option<ResolvedImage> {
        self.state.lock().image.clone()
    }

    /// Whether an image is available.
    pub fn has_image(&self) -> bool {
        self.state.lock().image.is_some()
    }

    /// Emitted when a fetch finishes, successfully or not.
    ///
    /// A loader that was evicted or cleared while fetching still emits, but
    /// keeps no image.
    pub fn completed(&self) -> &Signal<()> {
        &self.completed
    }

    /// A loader that neither has an image nor is fetching one may be replaced.
    fn is_replaceable(&self) -> bool {
        let state = self.state.lock();
        !state.downloading && state.image.is_none()
    }

    fn set_downloading(&self, downloading: bool) {
        self.state.lock().downloading = downloading;
    }

    fn set_image(&self, image: ResolvedImage) {
        let mut state = self.state.lock();
        state.downloading = false;
        state.image = Some(image);
    }
}

impl fmt::Debug for RemoteImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RemoteImageLoader")
            .field("key", &self.key)
            .field("downloading", &state.downloading)
            .field("has_image", &state.image.is_some())
            .finish()
    }
}

struct Completion {
    loader: Arc<RemoteImageLoader>,
    result: std::result::Result<Vec<u8>, NetworkError>,
}

struct Entry {
    loader: Arc<RemoteImageLoader>,
    last_used: u64,
}

#[derive(Default)]
struct LoaderTable {
    entries: HashMap<String, Entry>,
    clock: u64,
}

impl LoaderTable {
    fn touch(&mut self, key: &str) -> Option<Arc<RemoteImageLoader>> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            Arc::clone(&entry.loader)
        })
    }

    fn publish(&mut self, loader: Arc<RemoteImageLoader>) {
        self.clock += 1;
        self.entries.insert(
            loader.key().to_string(),
            Entry {
                loader,
                last_used: self.clock,
            },
        );
    }

    fn is_published(&self, loader: &Arc<RemoteImageLoader>) -> bool {
        self.entries
            .get(loader.key())
            .is_some_and(|entry| Arc::ptr_eq(&entry.loader, loader))
    }

    /// Drop least recently used idle loaders until at most `max` remain.
    /// In-flight loaders and the loader under `keep` are never evicted, so the
    /// table may stay above `max` while fetches are running.
    fn evict_to(&mut self, max: usize, keep: &str) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max {
            let oldest = self
                .entries
                .iter()
                .filter(|(key, entry)| key.as_str() != keep && !entry.loader.is_downloading())
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            let Some(key) = oldest else {
                break;
            };
            self.entries.remove(&key);
            evicted += 1;
        }
        evicted
    }
}

/// Keyed cache of remote images, bounded in memory and on disk.
pub struct RemoteImageCache {
    config: RemoteImageConfig,
    fetcher: Arc<dyn RemoteFetcher>,
    loaders: Mutex<LoaderTable>,
    disk: Option<Mutex<DiskImageCache>>,
    completions_tx: Sender<Completion>,
    completions_rx: Receiver<Completion>,
}

impl RemoteImageCache {
    /// Create a cache that fetches over HTTP.
    pub fn new(config: RemoteImageConfig) -> Result<Self> {
        let fetcher = HttpFetcher::with_timeout(config.request_timeout())
            .map_err(|e| IconError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create a cache with a custom fetcher.
    ///
    /// If the disk cache directory cannot be created the cache runs memory-only.
    pub fn with_fetcher(config: RemoteImageConfig, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        let disk = match DiskImageCache::new(config.disk_cache_config()) {
            Ok(disk) => Some(Mutex::new(disk)),
            Err(e) => {
                tracing::warn!(
                    target: targets::REMOTE,
                    dir = %config.cache_dir.display(),
                    error = %e,
                    "remote image disk cache unavailable"
                );
                None
            }
        };
        let (completions_tx, completions_rx) = unbounded();
        Self {
            config,
            fetcher,
            loaders: Mutex::new(LoaderTable::default()),
            disk,
            completions_tx,
            completions_rx,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &RemoteImageConfig {
        &self.config
    }

    /// URL of the avatar with `hash` at `pixels`.
    ///
    /// Unknown identities answer 404 rather than a generic image.
    pub fn url_for(&self, hash: &str, pixels: u32) -> String {
        format!(
            "{}/{}?d=404&s={}",
            self.config.base_url.trim_end_matches('/'),
            hash,
            pixels
        )
    }

    /// The loader for `identity` at `size` logical pixels and `scale`.
    ///
    /// An in-flight or successful loader for the same key is returned as is.
    /// A failed one is replaced and the image fetched again.
    pub fn get_remote_image(&self, identity: &str, size: u32, scale: u32) -> Arc<RemoteImageLoader> {
        let scale = scale.max(1);
        let pixels = size.saturating_mul(scale);
        let hash = avatar_hash(identity);
        let key = cache_key(&hash, pixels, scale);

        let mut loaders = self.loaders.lock();
        if let Some(existing) = loaders.touch(&key)
            && !existing.is_replaceable()
        {
            tracing::trace!(target: targets::REMOTE, key, "reusing remote image loader");
            return existing;
        }

        let loader = Arc::new(RemoteImageLoader::new(
            key.clone(),
            self.url_for(&hash, pixels),
            pixels,
        ));
        loaders.publish(Arc::clone(&loader));
        let evicted = loaders.evict_to(self.config.max_memory_entries.max(1), &key);
        drop(loaders);
        if evicted > 0 {
            tracing::debug!(target: targets::REMOTE, evicted, "evicted idle remote image loaders");
        }

        if let Some(image) = self.load_from_disk(&key) {
            tracing::debug!(target: targets::REMOTE, key, "remote image served from disk cache");
            loader.set_image(image);
            return loader;
        }

        self.start_fetch(&loader);
        loader
    }

    fn load_from_disk(&self, key: &str) -> Option<ResolvedImage> {
        let disk = self.disk.as_ref()?;
        let bytes = match disk.lock().get(key) {
            Ok(bytes) => bytes?,
            Err(e) => {
                tracing::warn!(target: targets::REMOTE, key, error = %e, "disk cache read failed");
                return None;
            }
        };
        match loader::decode(key, &bytes) {
            Ok(image) => Some(ResolvedImage::new(image)),
            Err(e) => {
                tracing::warn!(target: targets::REMOTE, key, error = %e, "discarding corrupt cached image");
                if let Err(e) = disk.lock().remove(key) {
                    tracing::warn!(target: targets::REMOTE, key, error = %e, "disk cache remove failed");
                }
                None
            }
        }
    }

    fn start_fetch(&self, loader: &Arc<RemoteImageLoader>) {
        loader.set_downloading(true);
        tracing::debug!(target: targets::REMOTE, key = loader.key(), url = loader.url(), "fetching remote image");

        let fetch = self.fetcher.fetch(loader.url());
        let tx = self.completions_tx.clone();
        let task_loader = Arc::clone(loader);
        let span = tracing::info_span!(
            target: "stockicon::perf",
            "perf",
            operation = span_names::REMOTE_FETCH,
            subject = loader.key()
        );
        let spawned = stockicon_net::runtime::spawn(
            async move {
                let result = fetch.await;
                // The cache may be gone; nothing to deliver to then.
                let _ = tx.send(Completion {
                    loader: task_loader,
                    result,
                });
            }
            .instrument(span),
        );

        if let Err(e) = spawned {
            tracing::error!(target: targets::REMOTE, key = loader.key(), error = %e, "cannot start remote fetch");
            loader.set_downloading(false);
        }
    }

    /// Apply finished fetches and emit their `completed` signals.
    ///
    /// Call from the UI thread. Returns the number of completions applied.
    pub fn process_completed(&self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Block until at least one fetch completes or `timeout` passes, then
    /// apply everything that is ready.
    pub fn wait_for_completion(&self, timeout: Duration) -> usize {
        match self.completions_rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.apply(completion);
                1 + self.process_completed()
            }
            Err(_) => 0,
        }
    }

    fn apply(&self, completion: Completion) {
        let Completion { loader, result } = completion;
        if !self.loaders.lock().is_published(&loader) {
            tracing::debug!(target: targets::REMOTE, key = loader.key(), "ignoring stale remote completion");
            loader.set_downloading(false);
            loader.completed().emit(());
            return;
        }

        match result.map_err(|e| e.to_string()).and_then(|bytes| {
            loader::decode(loader.key(), &bytes)
                .map(|image| (bytes, image))
                .map_err(|e| e.to_string())
        }) {
            Ok((bytes, image)) => {
                if let Some(disk) = &self.disk
                    && let Err(e) = disk.lock().insert(loader.key(), &bytes)
                {
                    tracing::warn!(target: targets::REMOTE, key = loader.key(), error = %e, "disk cache write failed");
                }
                loader.set_image(ResolvedImage::new(image));
                tracing::debug!(target: targets::REMOTE, key = loader.key(), "remote image loaded");
            }
            Err(e) => {
                loader.set_downloading(false);
                tracing::debug!(target: targets::REMOTE, key = loader.key(), error = %e, "remote image unavailable");
            }
        }
        loader.completed().emit(());
    }

    /// Number of loaders held in memory.
    pub fn len(&self) -> usize {
        self.loaders.lock().entries.len()
    }

    /// Whether no loader is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every loader. Fetches still in flight complete as stale.
    pub fn clear(&self) {
        self.loaders.lock().entries.clear();
    }
}

impl fmt::Debug for RemoteImageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteImageCache")
            .field("base_url", &self.config.base_url)
            .field("loaders", &self.len())
            .field("disk", &self.disk.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stockicon_render::{Color, ImageBuffer};

    const WAIT: Duration = Duration::from_secs(5);

    type FetchResult = std::result::Result<Vec<u8>, NetworkError>;

    #[derive(Default)]
    struct FakeFetcher {
        // `None` never completes.
        responses: Mutex<VecDeque<Option<FetchResult>>>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn respond(&self, result: FetchResult) {
            self.responses.lock().push_back(Some(result));
        }

        fn hang(&self) {
            self.responses.lock().push_back(None);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RemoteFetcher for FakeFetcher {
        fn fetch(&self, _url: &str) -> BoxFuture<'static, FetchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().pop_front() {
                Some(Some(result)) => futures_util::future::ready(result).boxed(),
                Some(None) => futures_util::future::pending::<FetchResult>().boxed(),
                None => futures_util::future::ready(Err(NetworkError::Timeout)).boxed(),
            }
        }
    }

    fn png(px: u32) -> Vec<u8> {
        ImageBuffer::from_color(px, px, Color::BLUE).to_png().unwrap()
    }

    fn not_found() -> NetworkError {
        NetworkError::HttpStatus {
            status: 404,
            message: None,
        }
    }

    fn new_cache(dir: &std::path::Path, fetcher: &Arc<FakeFetcher>) -> RemoteImageCache {
        let config = RemoteImageConfig::default().with_cache_dir(dir);
        RemoteImageCache::with_fetcher(config, fetcher.clone())
    }

    #[test]
    fn test_avatar_hash_normalizes() {
        assert_eq!(avatar_hash("  Jane@Example.COM "), avatar_hash("jane@example.com"));
        assert_eq!(avatar_hash("x").len(), 64);
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("abc", 32, 1), "abc@32x32");
        assert_eq!(cache_key("abc", 64, 2), "abc@64x64x2");
    }

    #[test]
    fn test_url_shape() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = RemoteImageCache::with_fetcher(
            RemoteImageConfig::default()
                .with_cache_dir(dir.path())
                .with_base_url("http://avatars.test/avatar/"),
            fetcher,
        );
        assert_eq!(cache.url_for("abc", 48), "http://avatars.test/avatar/abc?d=404&s=48");
    }

    #[test]
    fn test_concurrent_requests_share_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.respond(Ok(png(32)));
        let cache = new_cache(dir.path(), &fetcher);

        let first = cache.get_remote_image("jane@example.com", 32, 1);
        let second = cache.get_remote_image("jane@example.com", 32, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_downloading());
        assert_eq!(fetcher.calls(), 1);

        assert_eq!(cache.wait_for_completion(WAIT), 1);
        assert!(first.has_image());
        assert!(!first.is_downloading());
    }

    #[test]
    fn test_failed_fetch_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.respond(Err(not_found()));
        fetcher.respond(Ok(png(32)));
        let cache = new_cache(dir.path(), &fetcher);

        let failed = cache.get_remote_image("jane@example.com", 32, 1);
        cache.wait_for_completion(WAIT);
        assert!(failed.image().is_none());
        assert!(!failed.is_downloading());

        let retry = cache.get_remote_image("jane@example.com", 32, 1);
        assert!(!Arc::ptr_eq(&failed, &retry));
        assert_eq!(fetcher.calls(), 2);
        cache.wait_for_completion(WAIT);
        assert!(retry.has_image());
    }

    #[test]
    fn test_success_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.respond(Ok(png(32)));
        let cache = new_cache(dir.path(), &fetcher);

        let loaded = cache.get_remote_image("jane@example.com", 32, 1);
        cache.wait_for_completion(WAIT);
        let again = cache.get_remote_image("jane@example.com", 32, 1);
        assert!(Arc::ptr_eq(&loaded, &again));
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_sizes_and_scales_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = new_cache(dir.path(), &fetcher);

        let a = cache.get_remote_image("jane@example.com", 32, 1);
        let b = cache.get_remote_image("jane@example.com", 32, 2);
        let c = cache.get_remote_image("jane@example.com", 64, 1);
        assert_ne!(a.key(), b.key());
        assert_ne!(b.key(), c.key());
        assert_eq!(b.pixels(), 64);
        assert_eq!(fetcher.calls(), 3);
    }

    #[test]
    fn test_completion_signal_and_disk_cache() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.respond(Ok(png(32)));
        let cache = new_cache(dir.path(), &fetcher);

        let loader = cache.get_remote_image("jane@example.com", 32, 1);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        loader.completed().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        cache.wait_for_completion(WAIT);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(dir.path().join(loader.key()).is_file());

        let fresh_fetcher = Arc::new(FakeFetcher::default());
        let reopened = new_cache(dir.path(), &fresh_fetcher);
        let from_disk = reopened.get_remote_image("jane@example.com", 32, 1);
        assert!(from_disk.has_image());
        assert_eq!(fresh_fetcher.calls(), 0);
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.respond(Ok(png(32)));
        let cache = new_cache(dir.path(), &fetcher);

        let loader = cache.get_remote_image("jane@example.com", 32, 1);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        loader.completed().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        cache.clear();
        cache.wait_for_completion(WAIT);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!loader.has_image());
        assert!(!loader.is_downloading());
        assert!(!dir.path().join(loader.key()).exists());
    }

    #[test]
    fn test_memory_bound_evicts_idle_loaders() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let config = RemoteImageConfig::default()
            .with_cache_dir(dir.path())
            .with_max_memory_entries(2);
        let cache = RemoteImageCache::with_fetcher(config, fetcher.clone());

        for who in ["a@x", "b@x", "c@x"] {
            cache.get_remote_image(who, 16, 1);
            cache.wait_for_completion(WAIT);
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_memory_bound_keeps_new_loader_when_others_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.hang();
        fetcher.hang();
        fetcher.respond(Ok(png(16)));
        let config = RemoteImageConfig::default()
            .with_cache_dir(dir.path())
            .with_max_memory_entries(2);
        let cache = RemoteImageCache::with_fetcher(config, fetcher.clone());

        let a = cache.get_remote_image("a@x", 16, 1);
        let b = cache.get_remote_image("b@x", 16, 1);
        let c = cache.get_remote_image("c@x", 16, 1);
        assert!(a.is_downloading());
        assert!(b.is_downloading());
        assert_eq!(cache.len(), 3);

        assert_eq!(cache.wait_for_completion(WAIT), 1);
        assert!(c.has_image());
        assert!(!c.is_downloading());

        let again = cache.get_remote_image("c@x", 16, 1);
        assert!(Arc::ptr_eq(&c, &again));
        assert_eq!(fetcher.calls(), 3);
        assert!(a.is_downloading());
        assert!(b.is_downloading());
    }
}
