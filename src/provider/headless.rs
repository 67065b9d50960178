//! A deterministic in-process provider.
//!
//! Nothing is read from anywhere: operations complete on the first poll unless
//! their bundle is held, and fail if their bundle was scripted to. Every issued
//! operation is recorded so callers can assert exactly what was asked for.

use std::collections::HashSet;
use std::path::Path;

use super::{ArchiveHandle, AssetProvider, ContentHandle, OpStatus, UnloadHandle};
use crate::mapping::BundleId;
use crate::utils::object_pool::ObjectPool;

/// An operation issued to a `HeadlessProvider`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Mount(String),
    Unmount(String),
    Load(String, Vec<ContentHandle>),
    Unload(String),
}

impl Event {
    /// File name of the bundle this operation targets.
    pub fn bundle(&self) -> &str {
        match *self {
            Event::Mount(ref v) | Event::Unmount(ref v) | Event::Unload(ref v) => v,
            Event::Load(ref v, _) => v,
        }
    }
}

#[derive(Debug)]
struct Op {
    bundle: String,
    failed: bool,
}

#[derive(Default)]
pub struct HeadlessProvider {
    archives: ObjectPool<ArchiveHandle, Op>,
    contents: ObjectPool<ContentHandle, Op>,
    unloads: ObjectPool<UnloadHandle, Op>,

    held: HashSet<String>,
    held_contents: HashSet<String>,
    failing_archives: HashSet<String>,
    failing_contents: HashSet<String>,

    events: Vec<Event>,
}

impl HeadlessProvider {
    pub fn new() -> Self {
        HeadlessProvider::default()
    }

    /// Keeps every operation of `bundle` in progress until `release`.
    pub fn hold(&mut self, bundle: BundleId) {
        self.held.insert(bundle.file_name());
    }

    /// Keeps content loads of `bundle` in progress until `release`, letting
    /// its mounts and unloads through.
    pub fn hold_content(&mut self, bundle: BundleId) {
        self.held_contents.insert(bundle.file_name());
    }

    pub fn release(&mut self, bundle: BundleId) {
        let name = bundle.file_name();
        self.held.remove(&name);
        self.held_contents.remove(&name);
    }

    /// Makes every later mount of `bundle` fail.
    pub fn fail_archive(&mut self, bundle: BundleId) {
        self.failing_archives.insert(bundle.file_name());
    }

    /// Makes every later content load of `bundle` fail.
    pub fn fail_content(&mut self, bundle: BundleId) {
        self.failing_contents.insert(bundle.file_name());
    }

    /// Every operation issued so far, in order.
    #[inline]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Operations issued for `bundle`, in order.
    pub fn events_of(&self, bundle: BundleId) -> Vec<&Event> {
        let name = bundle.file_name();
        self.events.iter().filter(|v| v.bundle() == name).collect()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Number of archives mounted and not yet unmounted.
    #[inline]
    pub fn mounted_archives(&self) -> usize {
        self.archives.len()
    }

    /// Number of content files loaded and not yet unloaded.
    #[inline]
    pub fn loaded_contents(&self) -> usize {
        self.contents.len()
    }

    fn is_held(&self, bundle: &str) -> bool {
        self.held.contains(bundle)
    }

    fn status(&self, op: Option<&Op>) -> OpStatus {
        match op {
            None => OpStatus::Failed,
            Some(v) if self.is_held(&v.bundle) => OpStatus::InProgress,
            Some(v) if v.failed => OpStatus::Failed,
            Some(_) => OpStatus::Complete,
        }
    }
}

fn bundle_of(path: &str) -> String {
    path.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(path)
        .to_owned()
}

impl AssetProvider for HeadlessProvider {
    fn mount(&mut self, _: &str, path: &Path) -> ArchiveHandle {
        let bundle = bundle_of(&path.to_string_lossy());
        let failed = self.failing_archives.contains(&bundle);

        self.events.push(Event::Mount(bundle.clone()));
        self.archives.create(Op { bundle, failed })
    }

    fn archive_status(&mut self, handle: ArchiveHandle) -> OpStatus {
        self.status(self.archives.get(handle))
    }

    fn wait_archive(&mut self, handle: ArchiveHandle) -> OpStatus {
        // Nothing runs in the background, so a held mount completes here.
        match self.archives.get(handle) {
            Some(v) if v.failed => OpStatus::Failed,
            Some(_) => OpStatus::Complete,
            None => OpStatus::Failed,
        }
    }

    fn mount_path(&self, handle: ArchiveHandle) -> Option<String> {
        self.archives
            .get(handle)
            .filter(|v| !v.failed)
            .map(|v| format!("headless://{}/", v.bundle))
    }

    fn unmount(&mut self, handle: ArchiveHandle) {
        if let Some(v) = self.archives.free(handle) {
            self.events.push(Event::Unmount(v.bundle));
        }
    }

    fn load_content(&mut self, _: &str, path: &str, dependencies: &[ContentHandle]) -> ContentHandle {
        let bundle = bundle_of(path);
        let failed = self.failing_contents.contains(&bundle);

        self.events
            .push(Event::Load(bundle.clone(), dependencies.to_vec()));
        self.contents.create(Op { bundle, failed })
    }

    fn content_status(&mut self, handle: ContentHandle) -> OpStatus {
        match self.contents.get(handle) {
            Some(v) if self.held_contents.contains(&v.bundle) => OpStatus::InProgress,
            op => self.status(op),
        }
    }

    fn wait_content(&mut self, handle: ContentHandle) -> OpStatus {
        match self.contents.get(handle) {
            Some(v) if v.failed => OpStatus::Failed,
            Some(_) => OpStatus::Complete,
            None => OpStatus::Failed,
        }
    }

    fn unload_content(&mut self, handle: ContentHandle) -> UnloadHandle {
        let bundle = match self.contents.free(handle) {
            Some(v) => v.bundle,
            None => String::new(),
        };

        self.events.push(Event::Unload(bundle.clone()));
        self.unloads.create(Op {
            bundle,
            failed: false,
        })
    }

    fn is_unloaded(&mut self, handle: UnloadHandle) -> bool {
        let held = match self.unloads.get(handle) {
            Some(v) => self.is_held(&v.bundle),
            None => return true,
        };

        if !held {
            self.unloads.free(handle);
        }

        !held
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn hold_and_fail() {
        let bundle = BundleId::new(Uuid::from_u128(5));
        let mut provider = HeadlessProvider::new();
        provider.hold(bundle);

        let path = Path::new("archives").join(bundle.file_name());
        let archive = provider.mount("ns", &path);
        assert_eq!(provider.archive_status(archive), OpStatus::InProgress);

        provider.release(bundle);
        assert_eq!(provider.archive_status(archive), OpStatus::Complete);

        let prefix = provider.mount_path(archive).unwrap();
        provider.fail_content(bundle);
        let content = provider.load_content(
            "ns",
            &format!("{}{}", prefix, bundle.file_name()),
            &[ContentHandle::global()],
        );

        assert_eq!(provider.content_status(content), OpStatus::Failed);
        assert_eq!(provider.loaded_contents(), 1);

        let unload = provider.unload_content(content);
        assert!(provider.is_unloaded(unload));
        provider.unmount(archive);

        assert_eq!(provider.mounted_archives(), 0);
        assert_eq!(provider.loaded_contents(), 0);
        assert_eq!(provider.events_of(bundle).len(), 4);
        assert_eq!(
            provider.events()[1],
            Event::Load(bundle.file_name(), vec![ContentHandle::global()])
        );
    }
}
