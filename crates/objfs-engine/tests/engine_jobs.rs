//! Jobs run end to end against local-disk and in-memory stores.

use std::collections::BTreeMap;

use objfs_engine::{
    ComputeEngine, EngineConfig, EngineError, FsOverride, LocalEngine, PartitionedDataset,
    COMPLETION_MARKER,
};
use objfs_store::{resolve, Path};
use proptest::prelude::*;
use url::Url;

#[test]
fn test_local_disk_write_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let uri = Url::from_directory_path(dir.path()).unwrap();
    let binding = resolve(uri.as_str(), &BTreeMap::new()).unwrap();
    let fs = FsOverride::from_binding(&binding);
    let engine = LocalEngine::new(EngineConfig::default().with_partitions(4)).unwrap();
    let dest = binding.join("jobs/out");

    let data = PartitionedDataset::sequence(1000, engine.default_parallelism());
    let summary = engine.submit_partitioned_write(&data, &dest, Some(&fs)).unwrap();
    assert_eq!(summary.files.len(), 4);

    assert!(dir.path().join("jobs/out").join(COMPLETION_MARKER).is_file());
    assert!(dir.path().join("jobs/out/part-00003").is_file());
    assert_eq!(engine.submit_count(&dest, Some(&fs)).unwrap(), 1000);
}

#[test]
fn test_two_stores_in_one_engine() {
    let left = format!("memory://jobs-left-{}/", uuid::Uuid::new_v4().simple());
    let right = format!("memory://jobs-right-{}/", uuid::Uuid::new_v4().simple());
    let engine = LocalEngine::new(EngineConfig::default()).unwrap();
    let dest = Path::from("shared-name");

    let left_fs = FsOverride::new(Url::parse(&left).unwrap());
    let right_fs = FsOverride::new(Url::parse(&right).unwrap());
    engine
        .submit_partitioned_write(&PartitionedDataset::sequence(3, 1), &dest, Some(&left_fs))
        .unwrap();
    engine
        .submit_partitioned_write(&PartitionedDataset::sequence(7, 1), &dest, Some(&right_fs))
        .unwrap();

    assert_eq!(engine.submit_count(&dest, Some(&left_fs)).unwrap(), 3);
    assert_eq!(engine.submit_count(&dest, Some(&right_fs)).unwrap(), 7);
}

#[test]
fn test_unknown_scheme_fails_the_job() {
    let engine = LocalEngine::new(EngineConfig::default()).unwrap();
    let fs = FsOverride::new(Url::parse("nosuch://bucket/").unwrap());
    let err = engine
        .submit_partitioned_write(&PartitionedDataset::sequence(1, 1), &Path::from("x"), Some(&fs))
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}

#[test]
fn test_reader_skips_hidden_entries() {
    let root = format!("memory://jobs-hidden-{}/", uuid::Uuid::new_v4().simple());
    let engine = LocalEngine::new(EngineConfig::default()).unwrap();
    let fs = FsOverride::new(Url::parse(&root).unwrap());
    let dest = Path::from("out");
    engine
        .submit_partitioned_write(&PartitionedDataset::sequence(5, 2), &dest, Some(&fs))
        .unwrap();
    let binding = resolve(&root, &BTreeMap::new()).unwrap();
    binding.fs().mkdirs(&dest).unwrap();

    assert_eq!(engine.submit_count(&dest, Some(&fs)).unwrap(), 5);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_read_returns_written_records_in_order(count in 0u64..300, partitions in 1usize..6) {
        let root = format!("memory://jobs-prop-{}/", uuid::Uuid::new_v4().simple());
        let engine = LocalEngine::new(EngineConfig::default().with_worker_threads(2)).unwrap();
        let fs = FsOverride::new(Url::parse(&root).unwrap());
        let dest = Path::from("out");
        let data = PartitionedDataset::sequence(count, partitions);
        engine.submit_partitioned_write(&data, &dest, Some(&fs)).unwrap();

        let lines = engine.submit_read(&dest, Some(&fs)).unwrap();
        let expected: Vec<String> = (1..=count).map(|i| i.to_string()).collect();
        prop_assert_eq!(lines, expected);
    }
}
