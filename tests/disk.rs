extern crate crayon_bundles;
extern crate uuid;

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use crayon_bundles::prelude::*;

type System = BundleSystem<DirectoryProvider>;

fn bundle(n: u128) -> BundleId {
    BundleId::new(Uuid::from_u128(n))
}

fn asset(n: u128) -> AssetId {
    AssetId::new(Uuid::from_u128(0x1000 + n), 1)
}

/// Bundle 1 depends on bundle 2. Bundle 3 has an empty content file and the
/// archive of bundle 4 is missing.
fn testbed(name: &str) -> (System, PathBuf) {
    let dir = std::env::temp_dir().join(format!("crayon-bundles-disk-{}", name));
    let _ = fs::remove_dir_all(&dir);

    let mut params = BundleParams::default();
    params.base_dir = dir.clone();
    params.workers = 2;

    let contents: [(u128, &[u8]); 3] = [(1, &b"world"[..]), (2, &b"hello"[..]), (3, &b""[..])];
    for &(n, bytes) in &contents {
        let archive = params.archive_file(bundle(n));
        fs::create_dir_all(&archive).unwrap();
        fs::write(archive.join(bundle(n).file_name()), bytes).unwrap();
    }

    let mapping = MappingBuilder::new()
        .bundle(bundle(1), vec![bundle(2), BundleId::sentinel()])
        .bundle(bundle(2), vec![BundleId::sentinel()])
        .bundle(bundle(3), vec![])
        .bundle(bundle(4), vec![])
        .asset(asset(1), bundle(1), 0)
        .asset(asset(2), bundle(2), 2)
        .asset(asset(3), bundle(3), 0)
        .asset(asset(4), bundle(4), 0)
        .build();

    {
        let mut file = fs::File::create(params.mapping_file()).unwrap();
        mapping.write_to(&mut file).unwrap();
    }

    (BundleSystem::from_directory(params).unwrap(), dir)
}

fn advance_until<F>(sys: &mut System, mut done: F)
where
    F: FnMut(&System) -> bool,
{
    for _ in 0..2000 {
        if done(sys) {
            return;
        }

        sys.advance();
        thread::sleep(Duration::from_millis(1));
    }

    panic!("bundles did not settle in time");
}

#[test]
fn stream_from_folders() {
    let (mut sys, dir) = testbed("stream");

    let mut handles = Vec::new();
    for n in 1..=4 {
        handles.push(sys.load(asset(n), Priority::NORMAL).unwrap());
    }

    advance_until(&mut sys, |sys| handles.iter().all(|&h| sys.poll(h).is_done()));

    assert_eq!(sys.state(bundle(1)), Some(BundleState::Loaded));
    assert_eq!(sys.state(bundle(2)), Some(BundleState::Loaded));
    assert_eq!(sys.state(bundle(3)), Some(BundleState::ErrorContentFiles));
    assert_eq!(sys.state(bundle(4)), Some(BundleState::ErrorArchive));

    let world = sys.poll(handles[0]).content().unwrap();
    let hello = sys.poll(handles[1]).content().unwrap();
    assert_eq!(hello.local_offset, 2);
    assert_eq!(
        sys.provider().bytes(world.content).unwrap().as_slice(),
        b"world"
    );
    assert_eq!(
        sys.provider().bytes(hello.content).unwrap().as_slice(),
        b"hello"
    );

    assert_eq!(sys.poll(handles[2]), LoadResult::Fail);
    assert_eq!(sys.poll(handles[3]), LoadResult::Fail);

    for h in &mut handles {
        sys.unload_async(h).unwrap();
    }

    advance_until(&mut sys, |sys| sys.bundles().is_empty());
    assert_eq!(sys.ongoing(), Ongoing::default());
    assert_eq!(sys.provider().mounted_archives(), 0);
    assert_eq!(sys.provider().loaded_contents(), 0);

    drop(sys);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn force_content() {
    let (mut sys, dir) = testbed("force");

    assert!(sys.force_content(asset(1)).is_err());

    sys.start_loading(asset(1), Priority::NORMAL).unwrap();
    sys.start_loading(asset(4), Priority::NORMAL).unwrap();

    let content = sys.force_content(asset(1)).unwrap().unwrap();
    assert_eq!(
        sys.provider().bytes(content.content).unwrap().as_slice(),
        b"world"
    );

    assert_eq!(sys.force_content(asset(4)).unwrap(), None);
    assert_eq!(sys.state(bundle(4)), Some(BundleState::ErrorArchive));
    assert_eq!(sys.ongoing(), Ongoing::default());

    sys.start_unloading(asset(1), Priority::NORMAL).unwrap();
    sys.start_unloading(asset(4), Priority::NORMAL).unwrap();
    advance_until(&mut sys, |sys| sys.bundles().is_empty());

    drop(sys);
    fs::remove_dir_all(&dir).unwrap();
}
