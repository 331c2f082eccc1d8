//! Round trips through the engine into session test directories.

mod common;

use std::collections::BTreeMap;

use objfs_store::{resolve, READAHEAD_OPTION};
use objfs_tests::{HarnessError, LatencyRecorder, RoundTripVerifier};
use proptest::prelude::*;

use common::{enabled_manager, engine, memory_uri};

fn round_trip(count: u64) {
    let manager = enabled_manager(&memory_uri("n"));
    let mut session = manager.acquire("roundtrip").unwrap();
    let engine = engine();
    let recorder = LatencyRecorder::new();
    let binding = session.binding().unwrap().clone();

    let report = RoundTripVerifier::new(&engine, &recorder)
        .write_and_read_back(count, &binding, &binding, &session.path("out"))
        .unwrap();
    assert_eq!(report.records_written, count);
    assert_eq!(report.records_read, count);
    assert_eq!(report.data_files.len(), 1);
    let labels: Vec<&str> = report.timings.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, vec!["roundtrip-write", "roundtrip-list", "roundtrip-read"]);

    session.release().unwrap();
}

#[test]
fn test_round_trip_single_record() {
    round_trip(1);
}

#[test]
fn test_round_trip_thousand_records() {
    round_trip(1000);
}

#[test]
fn test_round_trip_hundred_thousand_records() {
    round_trip(100_000);
}

#[test]
fn test_thousand_integers_layout() {
    let manager = enabled_manager(&memory_uri("layout"));
    let session = manager.acquire("layout").unwrap();
    let engine = engine();
    let recorder = LatencyRecorder::new();
    let binding = session.binding().unwrap().clone();
    let destination = session.path("out");

    RoundTripVerifier::new(&engine, &recorder)
        .write_and_read_back(1000, &binding, &binding, &destination)
        .unwrap();

    let listing = binding.fs().list_status(&destination).unwrap();
    let names: Vec<&str> = listing.iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["_SUCCESS", "part-00000"]);
    assert_eq!(listing[0].length, 0);
    let expected_bytes: u64 = (1..=1000u64).map(|i| i.to_string().len() as u64 + 1).sum();
    assert_eq!(listing[1].length, expected_bytes);
}

#[test]
fn test_two_partitions_is_unexpected_layout() {
    let manager = enabled_manager(&memory_uri("two"));
    let session = manager.acquire("two").unwrap();
    let engine = engine();
    let recorder = LatencyRecorder::new();
    let binding = session.binding().unwrap().clone();

    let err = RoundTripVerifier::new(&engine, &recorder)
        .with_partitions(2)
        .write_and_read_back(1000, &binding, &binding, &session.path("out"))
        .unwrap_err();
    match err {
        HarnessError::UnexpectedLayout { listing, .. } => {
            assert!(listing.iter().any(|e| e.starts_with("part-00001")));
        }
        other => panic!("expected UnexpectedLayout, got {other:?}"),
    }
}

#[test]
fn test_two_partitions_accepted_when_expected() {
    let manager = enabled_manager(&memory_uri("two-ok"));
    let session = manager.acquire("two-ok").unwrap();
    let engine = engine();
    let recorder = LatencyRecorder::new();
    let binding = session.binding().unwrap().clone();

    let report = RoundTripVerifier::new(&engine, &recorder)
        .with_partitions(2)
        .with_expected_data_files(2)
        .write_and_read_back(1000, &binding, &binding, &session.path("out"))
        .unwrap();
    assert_eq!(report.records_read, 1000);
}

#[test]
fn test_existing_destination_is_execution_error() {
    let manager = enabled_manager(&memory_uri("exec"));
    let session = manager.acquire("exec").unwrap();
    let engine = engine();
    let recorder = LatencyRecorder::new();
    let binding = session.binding().unwrap().clone();
    let destination = session.path("out");
    let verifier = RoundTripVerifier::new(&engine, &recorder);

    verifier
        .write_and_read_back(10, &binding, &binding, &destination)
        .unwrap();
    let err = verifier
        .write_and_read_back(10, &binding, &binding, &destination)
        .unwrap_err();
    assert!(matches!(err, HarnessError::Execution(_)));
}

#[test]
fn test_cross_binding_read() {
    let manager = enabled_manager(&memory_uri("cross"));
    let session = manager.acquire("cross").unwrap();
    let engine = engine();
    let recorder = LatencyRecorder::new();
    let binding = session.binding().unwrap().clone();
    let mut extra = BTreeMap::new();
    extra.insert(READAHEAD_OPTION.to_string(), "7".to_string());
    let alternate = session.alternate_binding(&extra).unwrap();

    let report = RoundTripVerifier::new(&engine, &recorder)
        .write_and_read_back(1000, &binding, &alternate, &session.path("out"))
        .unwrap();
    assert_eq!(report.records_read, 1000);
}

#[test]
fn test_local_disk_round_trip_and_release() {
    let dir = tempfile::tempdir().unwrap();
    let uri = url::Url::from_directory_path(dir.path()).unwrap();
    let manager = enabled_manager(uri.as_str());
    let mut session = manager.acquire("local").unwrap();
    let engine = engine();
    let recorder = LatencyRecorder::new();
    let binding = session.binding().unwrap().clone();

    RoundTripVerifier::new(&engine, &recorder)
        .write_and_read_back(1000, &binding, &binding, &session.path("out"))
        .unwrap();
    let test_directory = session.test_directory().clone();
    session.release().unwrap();

    let fresh = resolve(uri.as_str(), &BTreeMap::new()).unwrap();
    assert!(fresh.fs().stat(&test_directory).unwrap_err().is_not_found());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_count_preserved(count in 1u64..2000, partitions in 1usize..4) {
        let manager = enabled_manager(&memory_uri("prop"));
        let session = manager.acquire("prop").unwrap();
        let engine = engine();
        let recorder = LatencyRecorder::new();
        let binding = session.binding().unwrap().clone();
        let parts = partitions as u64;
        let non_empty = (0..parts)
            .filter(|i| (i + 1) * count / parts > i * count / parts)
            .count();

        let report = RoundTripVerifier::new(&engine, &recorder)
            .with_partitions(partitions)
            .with_expected_data_files(non_empty)
            .write_and_read_back(count, &binding, &binding, &session.path("out"))
            .unwrap();
        prop_assert_eq!(report.records_read, count);
    }
}
