//! Shared fixtures for harness integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use bytes::Bytes;
use objfs_engine::{EngineConfig, LocalEngine};
use objfs_store::resolve;
use objfs_tests::config::{
    ACCOUNT_ID_KEY, ACCOUNT_SECRET_KEY, ENABLED_KEY, FIXTURE_ROWS_KEY, FIXTURE_URI_KEY, URI_KEY,
};
use objfs_tests::{RunConfiguration, SessionManager};

pub fn memory_uri(tag: &str) -> String {
    format!("memory://harness-{tag}-{}/base", uuid::Uuid::new_v4().simple())
}

pub fn enabled_pairs(uri: &str) -> Vec<(String, String)> {
    vec![
        (ENABLED_KEY.to_string(), "true".to_string()),
        (ACCOUNT_ID_KEY.to_string(), "test-account".to_string()),
        (ACCOUNT_SECRET_KEY.to_string(), "test-secret".to_string()),
        (URI_KEY.to_string(), uri.to_string()),
    ]
}

pub fn enabled_manager(uri: &str) -> SessionManager {
    SessionManager::new(RunConfiguration::from_pairs(enabled_pairs(uri)))
}

pub fn engine() -> LocalEngine {
    LocalEngine::new(EngineConfig::default().with_worker_threads(2)).unwrap()
}

/// Write a zstd-compressed fixture of `rows` CSV lines; returns its URI.
pub fn zstd_fixture(rows: u64) -> String {
    let root = format!("memory://harness-fixture-{}/", uuid::Uuid::new_v4().simple());
    let uri = format!("{root}data/rows.csv.zst");
    let text: String = (0..rows).map(|i| format!("{i},row-{i},{}\n", i * 7)).collect();
    let compressed = zstd::stream::encode_all(text.as_bytes(), 3).unwrap();
    let binding = resolve(&uri, &BTreeMap::new()).unwrap();
    binding
        .fs()
        .create(binding.base(), Bytes::from(compressed))
        .unwrap();
    uri
}

pub fn with_fixture(uri: &str, fixture_uri: &str, rows: u64) -> RunConfiguration {
    let mut pairs = enabled_pairs(uri);
    pairs.push((FIXTURE_URI_KEY.to_string(), fixture_uri.to_string()));
    pairs.push((FIXTURE_ROWS_KEY.to_string(), rows.to_string()));
    RunConfiguration::from_pairs(pairs)
}
