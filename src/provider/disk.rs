//! A provider backed by the local filesystem.
//!
//! Every archive is a folder named after its bundle under the archives folder,
//! holding the content file of that bundle. Mounting checks the folder on a
//! worker thread; decoding reads the whole content file into memory. The tick
//! thread only polls the latches the workers set, so nothing blocks unless a
//! forced load asks to `wait`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::worker::WorkerPool;
use super::{ArchiveHandle, AssetProvider, ContentHandle, OpStatus, UnloadHandle};
use crate::errors::*;
use crate::utils::latch::Latch;
use crate::utils::object_pool::ObjectPool;

/// Decoded bytes of a content file, or `None` if decoding failed.
pub type Decoded = Option<Arc<Vec<u8>>>;

struct Archive {
    path: PathBuf,
    latch: Arc<Latch<bool>>,
}

struct Content {
    latch: Arc<Latch<Decoded>>,
}

pub struct DirectoryProvider {
    workers: WorkerPool,
    archives: ObjectPool<ArchiveHandle, Archive>,
    contents: ObjectPool<ContentHandle, Content>,
    unloads: ObjectPool<UnloadHandle, Arc<Latch<()>>>,
}

impl DirectoryProvider {
    /// Creates a provider running its file operations on `workers` threads.
    pub fn new(workers: usize) -> Result<Self> {
        Ok(DirectoryProvider {
            workers: WorkerPool::new(workers)?,
            archives: ObjectPool::new(),
            contents: ObjectPool::new(),
            unloads: ObjectPool::new(),
        })
    }

    /// Returns the bytes of a successfully decoded content file.
    pub fn bytes(&self, handle: ContentHandle) -> Option<Arc<Vec<u8>>> {
        self.contents
            .get(handle)
            .and_then(|v| v.latch.get())
            .and_then(|v| v)
    }

    #[inline]
    pub fn mounted_archives(&self) -> usize {
        self.archives.len()
    }

    #[inline]
    pub fn loaded_contents(&self) -> usize {
        self.contents.len()
    }
}

fn decode(path: &Path) -> Decoded {
    match fs::read(path) {
        Ok(ref bytes) if bytes.is_empty() => {
            warn!("Content file {:?} is empty.", path);
            None
        }
        Ok(bytes) => Some(Arc::new(bytes)),
        Err(err) => {
            warn!("Failed to read content file {:?}: {}", path, err);
            None
        }
    }
}

impl AssetProvider for DirectoryProvider {
    fn mount(&mut self, namespace: &str, path: &Path) -> ArchiveHandle {
        let latch = Arc::new(Latch::new());
        let handle = self.archives.create(Archive {
            path: path.to_owned(),
            latch: latch.clone(),
        });

        debug!("[{}] Mounts {:?}.", namespace, path);

        let path = path.to_owned();
        self.workers.spawn(move || latch.set(path.is_dir()));
        handle
    }

    fn archive_status(&mut self, handle: ArchiveHandle) -> OpStatus {
        match self.archives.get(handle).and_then(|v| v.latch.get()) {
            Some(true) => OpStatus::Complete,
            Some(false) => OpStatus::Failed,
            None if self.archives.contains(handle) => OpStatus::InProgress,
            None => OpStatus::Failed,
        }
    }

    fn wait_archive(&mut self, handle: ArchiveHandle) -> OpStatus {
        if let Some(v) = self.archives.get(handle) {
            v.latch.wait();
        }

        self.archive_status(handle)
    }

    fn mount_path(&self, handle: ArchiveHandle) -> Option<String> {
        self.archives
            .get(handle)
            .filter(|v| v.latch.get() == Some(true))
            .map(|v| format!("{}/", v.path.to_string_lossy()))
    }

    fn unmount(&mut self, handle: ArchiveHandle) {
        if let Some(v) = self.archives.free(handle) {
            debug!("Unmounts {:?}.", v.path);
        }
    }

    fn load_content(
        &mut self,
        namespace: &str,
        path: &str,
        dependencies: &[ContentHandle],
    ) -> ContentHandle {
        let latch = Arc::new(Latch::new());
        let handle = self.contents.create(Content {
            latch: latch.clone(),
        });

        debug!(
            "[{}] Decodes {} against {} dependencies.",
            namespace,
            path,
            dependencies.len()
        );

        let path = PathBuf::from(path);
        self.workers.spawn(move || latch.set(decode(&path)));
        handle
    }

    fn content_status(&mut self, handle: ContentHandle) -> OpStatus {
        match self.contents.get(handle) {
            Some(v) => match v.latch.get() {
                Some(Some(_)) => OpStatus::Complete,
                Some(None) => OpStatus::Failed,
                None => OpStatus::InProgress,
            },
            None => OpStatus::Failed,
        }
    }

    fn wait_content(&mut self, handle: ContentHandle) -> OpStatus {
        if let Some(v) = self.contents.get(handle) {
            v.latch.wait();
        }

        self.content_status(handle)
    }

    fn unload_content(&mut self, handle: ContentHandle) -> UnloadHandle {
        let latch = Arc::new(Latch::new());
        let unload = self.unloads.create(latch.clone());

        match self.contents.free(handle) {
            // The decode may still be running; release once it is done.
            Some(content) => self.workers.spawn(move || {
                content.latch.wait();
                drop(content);
                latch.set(());
            }),
            None => latch.set(()),
        }

        unload
    }

    fn is_unloaded(&mut self, handle: UnloadHandle) -> bool {
        let done = match self.unloads.get(handle) {
            Some(latch) => latch.is_set(),
            None => return true,
        };

        if done {
            self.unloads.free(handle);
        }

        done
    }
}
