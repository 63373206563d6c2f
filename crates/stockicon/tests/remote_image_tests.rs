//! Integration tests for remote avatar loading.

use std::time::Duration;

use stockicon::remote::{avatar_hash, cache_key};
use stockicon::{IconService, IconServiceConfig, RemoteImageConfig};

#[test]
fn test_cache_keys_distinguish_size_and_scale() {
    let hash = avatar_hash("someone@example.com");
    let keys = [
        cache_key(&hash, 32, 1),
        cache_key(&hash, 64, 1),
        cache_key(&hash, 64, 2),
    ];
    assert_ne!(keys[0], keys[1]);
    assert_ne!(keys[1], keys[2]);
}

#[test]
fn test_no_completions_before_first_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = IconServiceConfig::default()
        .with_remote(RemoteImageConfig::default().with_cache_dir(dir.path()));
    let service = IconService::new(config);
    assert_eq!(service.process_remote_completions(), 0);
}

#[cfg(feature = "integration-tests")]
mod integration_tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use stockicon::render::{Color, ImageBuffer};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WAIT: Duration = Duration::from_secs(10);

    fn png(px: u32) -> Vec<u8> {
        ImageBuffer::from_color(px, px, Color::GREEN)
            .to_png()
            .expect("encode png")
    }

    fn service(server: &MockServer, dir: &std::path::Path) -> IconService {
        let remote = RemoteImageConfig::default()
            .with_base_url(format!("{}/avatar", server.uri()))
            .with_cache_dir(dir)
            .with_request_timeout(Duration::from_secs(5));
        IconService::new(IconServiceConfig::default().with_remote(remote))
    }

    #[test]
    fn test_fetch_and_reuse() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let server = runtime.block_on(MockServer::start());
        let hash = avatar_hash("Someone@Example.com ");
        runtime.block_on(
            Mock::given(method("GET"))
                .and(path(format!("/avatar/{hash}")))
                .and(query_param("d", "404"))
                .and(query_param("s", "64"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(png(64)))
                .expect(1)
                .mount(&server),
        );

        let dir = tempfile::tempdir().expect("tempdir");
        let service = service(&server, dir.path());

        let loader = service
            .get_remote_image("someone@example.com", 32, 2)
            .expect("remote cache");
        let completed = Arc::new(AtomicUsize::new(0));
        let completed_clone = completed.clone();
        loader.completed().connect(move |_| {
            completed_clone.fetch_add(1, Ordering::SeqCst);
        });

        let again = service
            .get_remote_image("someone@example.com", 32, 2)
            .expect("remote cache");
        assert!(Arc::ptr_eq(&loader, &again));

        let remote = service.remote_cache().expect("remote cache");
        assert_eq!(remote.wait_for_completion(WAIT), 1);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        let image = loader.image().expect("image");
        assert_eq!(image.size().max_side(), 64);

        let reused = service
            .get_remote_image("someone@example.com", 32, 2)
            .expect("remote cache");
        assert!(Arc::ptr_eq(&loader, &reused));
        assert!(dir.path().join(loader.key()).is_file());
    }

    #[test]
    fn test_not_found_then_retry() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let server = runtime.block_on(MockServer::start());
        runtime.block_on(
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(404))
                .up_to_n_times(1)
                .mount(&server),
        );
        runtime.block_on(
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(png(32)))
                .mount(&server),
        );

        let dir = tempfile::tempdir().expect("tempdir");
        let service = service(&server, dir.path());
        let remote = service.remote_cache().expect("remote cache");

        let failed = remote.get_remote_image("nobody@example.com", 32, 1);
        remote.wait_for_completion(WAIT);
        assert!(failed.image().is_none());
        assert!(!failed.is_downloading());

        let retried = remote.get_remote_image("nobody@example.com", 32, 1);
        assert!(!Arc::ptr_eq(&failed, &retried));
        remote.wait_for_completion(WAIT);
        assert!(retried.has_image());

        let requests = runtime
            .block_on(server.received_requests())
            .expect("recording enabled");
        assert_eq!(requests.len(), 2);
    }
}
