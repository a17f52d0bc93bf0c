//! Saved versions survive closing and reopening the RocksDB store.

use ancon_api::{
    AvailableVersionsResponse, GetResponse, GetVersionedResponse, HashResponse, ProofService,
    SaveVersionResponse, ServiceConfig, VersionPolicy, VersionResponse,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn config_for(dir: &std::path::Path, policy: VersionPolicy) -> ServiceConfig {
    ServiceConfig {
        db_path: Some(dir.to_path_buf()),
        load_version: 0,
        version_policy: policy,
    }
}

#[test]
fn test_reopen_restores_versions() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let (hash_before, v1_hash) = {
        let service = ProofService::open(&config_for(dir.path(), VersionPolicy::Explicit)).unwrap();
        service.set(b"a", b"1").unwrap();
        service.set(b"b", b"2").unwrap();
        service.save_version().unwrap();
        let v1: HashResponse = service.hash().unwrap().decode().unwrap();

        service.set(b"a", b"10").unwrap();
        service.set(b"c", b"3").unwrap();
        service.save_version().unwrap();
        // Unsaved writes are not persisted.
        service.set(b"d", b"4").unwrap();
        service.rollback().unwrap();

        let hash: HashResponse = service.hash().unwrap().decode().unwrap();
        (hash, v1)
    };

    let service = ProofService::open(&config_for(dir.path(), VersionPolicy::Explicit)).unwrap();
    let hash: HashResponse = service.hash().unwrap().decode().unwrap();
    assert_eq!(hash, hash_before);

    let version: VersionResponse = service.version().unwrap().decode().unwrap();
    assert_eq!(version.version, 2);
    let versions: AvailableVersionsResponse =
        service.available_versions().unwrap().decode().unwrap();
    assert_eq!(versions.versions, vec![1, 2]);

    let a: GetResponse = service.get(b"a").unwrap().decode().unwrap();
    assert_eq!(a.value, b"10".to_vec());
    let old_a: GetVersionedResponse = service.get_versioned(1, b"a").unwrap().decode().unwrap();
    assert_eq!(old_a.value, b"1".to_vec());
    assert!(service.get(b"d").unwrap_err().is_key_not_found());

    // Resuming from version 1 exposes only that history.
    drop(service);
    let mut config = config_for(dir.path(), VersionPolicy::Explicit);
    config.load_version = 1;
    let service = ProofService::open(&config).unwrap();
    let hash: HashResponse = service.hash().unwrap().decode().unwrap();
    assert_eq!(hash, v1_hash);
    assert!(service.has_versioned(2).unwrap_err().is_version_not_found());
}

#[test]
fn test_auto_save_persists_each_write() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    {
        let service = ProofService::open(&config_for(dir.path(), VersionPolicy::AutoSave)).unwrap();
        service.set(b"x", b"1").unwrap();
        service.set(b"y", b"2").unwrap();
    }

    let service = ProofService::open(&config_for(dir.path(), VersionPolicy::Explicit)).unwrap();
    let versions: AvailableVersionsResponse =
        service.available_versions().unwrap().decode().unwrap();
    assert_eq!(versions.versions, vec![1, 2]);
    let y: GetResponse = service.get(b"y").unwrap().decode().unwrap();
    assert_eq!(y.value, b"2".to_vec());
}

#[test]
fn test_diverging_history_conflicts_until_overwritten() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    {
        let service = ProofService::open(&config_for(dir.path(), VersionPolicy::Explicit)).unwrap();
        service.set(b"k", b"1").unwrap();
        service.save_version().unwrap();
        service.set(b"k", b"2").unwrap();
        service.save_version().unwrap();
    }

    // Resume from version 1 and try to write a different version 2.
    let mut config = config_for(dir.path(), VersionPolicy::Explicit);
    config.load_version = 1;
    let service = ProofService::open(&config).unwrap();
    service.set(b"k", b"3").unwrap();
    let err = service.save_version().unwrap_err();
    assert!(err.to_string().contains("Version 2 already exists"));

    // Overwriting drops the stored version 2 so the new one can take its place.
    service.load_version_for_overwriting(1).unwrap();
    service.set(b"k", b"3").unwrap();
    let saved: SaveVersionResponse = service.save_version().unwrap().decode().unwrap();
    assert_eq!(saved.version, 2);
    drop(service);

    let service = ProofService::open(&config_for(dir.path(), VersionPolicy::Explicit)).unwrap();
    let versions: AvailableVersionsResponse =
        service.available_versions().unwrap().decode().unwrap();
    assert_eq!(versions.versions, vec![1, 2]);
    let k: GetResponse = service.get(b"k").unwrap().decode().unwrap();
    assert_eq!(k.value, b"3".to_vec());
    let hash: HashResponse = service.hash().unwrap().decode().unwrap();
    assert_eq!(hash.hash, saved.hash);

    let missing = ServiceConfig {
        load_version: 9,
        ..config_for(dir.path(), VersionPolicy::Explicit)
    };
    drop(service);
    assert!(matches!(ProofService::open(&missing), Err(e) if e.is_version_not_found()));
}
