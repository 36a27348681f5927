//! Shared fixtures for handler and client tests.

use crate::storage::{ObjectStore, in_memory::InMemoryStore};
use crate::upstream::{DocumentServiceClient, REQUEST_TIMEOUT};
use crate::{AppState, Config, build_router};
use axum_test::TestServer;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_BUCKET: &str = "test-bucket";
pub const TEST_REGION: &str = "us-east-1";
pub const TEST_API_TOKEN: &str = "test-token";

/// reqwest is built without a bundled crypto provider, so one has to be installed before any
/// client is created. Safe to call from every test.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// A valid configuration whose document service lives at `upstream_base`
/// (`{upstream_base}/ingest` and `{upstream_base}/chat`).
pub fn create_test_config(upstream_base: &str) -> Config {
    let mut config = Config::default();
    config.storage.bucket = TEST_BUCKET.to_string();
    config.storage.region = TEST_REGION.to_string();
    config.upstream.ingestion_url = Some(format!("{upstream_base}/ingest").parse().expect("invalid upstream base"));
    config.upstream.chat_url = Some(format!("{upstream_base}/chat").parse().expect("invalid upstream base"));
    config.upstream.api_token = Some(TEST_API_TOKEN.to_string());
    config
}

pub fn create_test_state(config: Config) -> (AppState, InMemoryStore) {
    create_test_state_with_timeout(config, REQUEST_TIMEOUT)
}

fn create_test_state_with_timeout(config: Config, timeout: Duration) -> (AppState, InMemoryStore) {
    install_crypto_provider();

    let storage = InMemoryStore::new(TEST_BUCKET, TEST_REGION);
    let upstream = DocumentServiceClient::with_timeout(&config.upstream, timeout).expect("Failed to create upstream client");

    let state = AppState::builder()
        .config(config)
        .storage(Arc::new(storage.clone()) as Arc<dyn ObjectStore>)
        .upstream(upstream)
        .build();

    (state, storage)
}

/// Full router backed by in-memory storage, talking to a document service at `upstream_base`.
pub fn create_test_app(upstream_base: &str) -> (TestServer, InMemoryStore) {
    create_test_app_with_timeout(upstream_base, REQUEST_TIMEOUT)
}

pub fn create_test_app_with_timeout(upstream_base: &str, timeout: Duration) -> (TestServer, InMemoryStore) {
    let (state, storage) = create_test_state_with_timeout(create_test_config(upstream_base), timeout);
    let router = build_router(state).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, storage)
}
