extern crate crayon_bundles;
extern crate uuid;

use std::fs::{self, File};
use std::path::PathBuf;

use uuid::Uuid;

use crayon_bundles::prelude::*;

fn bundle(n: u128) -> BundleId {
    BundleId::new(Uuid::from_u128(n))
}

fn asset(n: u128) -> AssetId {
    AssetId::new(Uuid::from_u128(0x1000 + n), n as i64)
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("crayon-bundles-mapping-{}", name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn sample() -> DependencyMapping {
    MappingBuilder::new()
        .bundle(bundle(1), vec![bundle(2), BundleId::sentinel(), bundle(3)])
        .bundle(bundle(2), vec![bundle(3)])
        .bundle(bundle(3), vec![])
        .asset(asset(1), bundle(1), 0)
        .asset(asset(2), bundle(1), 512)
        .asset(asset(3), bundle(3), 64)
        .build()
}

#[test]
fn file_roundtrip() {
    let dir = scratch("roundtrip");
    let path = dir.join("BundleMapping.bin");
    let mapping = sample();

    {
        let mut file = File::create(&path).unwrap();
        mapping.write_to(&mut file).unwrap();
    }

    let loaded = DependencyMapping::load(&path).unwrap();
    assert_eq!(loaded, mapping);
    assert_eq!(loaded.resolve(asset(2)), Some(bundle(1)));
    assert_eq!(loaded.local_offset(asset(2)), Some(512));
    assert_eq!(
        loaded.dependencies(bundle(1)),
        &[bundle(2), BundleId::sentinel(), bundle(3)]
    );
    assert_eq!(loaded.dependants(bundle(3)), &[bundle(1), bundle(2)]);

    // The same mapping always produces the same bytes.
    let mut a = Vec::new();
    let mut b = Vec::new();
    mapping.write_to(&mut a).unwrap();
    loaded.write_to(&mut b).unwrap();
    assert_eq!(a, b);
    assert_eq!(fs::read(&path).unwrap(), a);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_file() {
    let dir = scratch("missing");
    let mapping = DependencyMapping::load(dir.join("BundleMapping.bin")).unwrap();
    assert!(mapping.is_empty());
    assert_eq!(mapping.resolve(asset(1)), None);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn truncated_file() {
    let dir = scratch("truncated");
    let path = dir.join("BundleMapping.bin");

    let mut bytes = Vec::new();
    sample().write_to(&mut bytes).unwrap();
    bytes.truncate(bytes.len() / 2);
    fs::write(&path, &bytes).unwrap();

    assert!(DependencyMapping::load(&path).is_err());
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn system_reads_build_data() {
    let dir = scratch("system");

    let mut params = BundleParams::default();
    params.base_dir = dir.clone();
    params.use_build_data = true;

    {
        let mut file = File::create(params.mapping_file()).unwrap();
        sample().write_to(&mut file).unwrap();
    }

    let sys = BundleSystem::new(params.clone(), HeadlessProvider::new()).unwrap();
    assert_eq!(sys.mapping(), &sample());
    assert!(sys.can_load(asset(3)));

    // Without build data nothing is loadable.
    params.use_build_data = false;
    let sys = BundleSystem::new(params, HeadlessProvider::new()).unwrap();
    assert!(sys.mapping().is_empty());
    assert!(!sys.can_load(asset(3)));

    fs::remove_dir_all(&dir).unwrap();
}
