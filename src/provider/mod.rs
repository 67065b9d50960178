//! The asynchronous primitives the lifecycle engine drives.
//!
//! An `AssetProvider` mounts archives, decodes content files and unloads them
//! again. Every operation returns immediately with an opaque handle whose
//! progress is observed by polling; none of them can be cancelled once issued.
//! The engine never touches bundle bytes through any other path, so swapping
//! the provider (disk, memory, a packed file) leaves the engine untouched.

pub mod disk;
pub mod headless;
mod worker;

use std::path::Path;

impl_handle!(ArchiveHandle);
impl_handle!(ContentHandle);
impl_handle!(UnloadHandle);

impl ContentHandle {
    /// The well-known handle of the global table, passed in place of sentinel
    /// dependencies.
    #[inline]
    pub fn global() -> Self {
        ContentHandle(crate::utils::handle::Handle::new(
            ::std::u32::MAX,
            ::std::u32::MAX,
        ))
    }

    #[inline]
    pub fn is_global(self) -> bool {
        self == ContentHandle::global()
    }
}

/// Progress of an asynchronous mount or content load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpStatus {
    InProgress,
    Complete,
    Failed,
}

impl OpStatus {
    #[inline]
    pub fn is_done(self) -> bool {
        self != OpStatus::InProgress
    }
}

pub trait AssetProvider {
    /// Starts mounting the archive at `path`.
    fn mount(&mut self, namespace: &str, path: &Path) -> ArchiveHandle;

    fn archive_status(&mut self, handle: ArchiveHandle) -> OpStatus;

    /// Blocks until the mount finishes and returns its final status.
    fn wait_archive(&mut self, handle: ArchiveHandle) -> OpStatus;

    /// Prefix under which the files of a mounted archive are addressable.
    fn mount_path(&self, handle: ArchiveHandle) -> Option<String>;

    /// Unmounts the archive. Completion is not reported.
    fn unmount(&mut self, handle: ArchiveHandle);

    /// Starts decoding the content file at `path`. `dependencies` holds the
    /// content of every dependency in mapping order, `ContentHandle::global()`
    /// for sentinel entries and the nil handle for dependencies that failed.
    fn load_content(
        &mut self,
        namespace: &str,
        path: &str,
        dependencies: &[ContentHandle],
    ) -> ContentHandle;

    fn content_status(&mut self, handle: ContentHandle) -> OpStatus;

    /// Blocks until the decode finishes and returns its final status.
    fn wait_content(&mut self, handle: ContentHandle) -> OpStatus;

    /// Starts releasing decoded content.
    fn unload_content(&mut self, handle: ContentHandle) -> UnloadHandle;

    fn is_unloaded(&mut self, handle: UnloadHandle) -> bool;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn global_content() {
        assert!(ContentHandle::global().is_valid());
        assert!(ContentHandle::global().is_global());
        assert!(!ContentHandle::nil().is_global());
        assert!(OpStatus::Failed.is_done());
        assert!(!OpStatus::InProgress.is_done());
    }
}
