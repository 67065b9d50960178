//! Versioned load requests and their completion callbacks.
//!
//! Every `load_async` call takes a slot in the `TaskTable` and hands out a
//! `LoadTaskHandle` naming that slot and its current version. Releasing the
//! slot bumps the version, so any copy of an old handle fails closed even after
//! the slot has been reused by a newer request.

use std::fmt;

use crate::mapping::AssetId;
use crate::provider::ContentHandle;
use crate::utils::bitmask::Bitmask;

/// A caller-held reference to a load request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTaskHandle {
    index: u32,
    version: u32,
    cancelled: bool,
}

impl LoadTaskHandle {
    #[inline]
    fn new(index: u32, version: u32) -> Self {
        LoadTaskHandle {
            index,
            version,
            cancelled: false,
        }
    }

    #[inline]
    pub fn nil() -> Self {
        LoadTaskHandle::default()
    }

    /// Returns true if this handle was ever issued by a `TaskTable`. A valid
    /// handle may still be stale.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.version != 0
    }

    #[inline]
    pub fn is_cancelled(self) -> bool {
        self.cancelled
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn version(self) -> u32 {
        self.version
    }

    /// The same handle, marked as cancelled.
    #[inline]
    pub fn cancelled(self) -> Self {
        LoadTaskHandle {
            cancelled: true,
            ..self
        }
    }
}

impl fmt::Display for LoadTaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LoadTaskHandle({}, {}", self.index, self.version)?;
        if self.cancelled {
            write!(f, ", cancelled")?;
        }

        write!(f, ")")
    }
}

/// Content of a successfully loaded asset: the decoded bundle, and where the
/// asset lives inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedContent {
    pub content: ContentHandle,
    pub local_offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResultState {
    /// The handle is stale, out of range or was never issued.
    Invalid,
    /// The bundle of the asset reached one of its error states.
    Fail,
    /// The request was cancelled by its owner.
    Cancelled,
    Success,
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResult {
    Invalid,
    Fail,
    Cancelled,
    Success(LoadedContent),
    InProgress,
}

impl LoadResult {
    pub fn state(&self) -> LoadResultState {
        match *self {
            LoadResult::Invalid => LoadResultState::Invalid,
            LoadResult::Fail => LoadResultState::Fail,
            LoadResult::Cancelled => LoadResultState::Cancelled,
            LoadResult::Success(_) => LoadResultState::Success,
            LoadResult::InProgress => LoadResultState::InProgress,
        }
    }

    #[inline]
    pub fn content(&self) -> Option<LoadedContent> {
        match *self {
            LoadResult::Success(content) => Some(content),
            _ => None,
        }
    }

    /// Returns true if the request will not change any more.
    #[inline]
    pub fn is_done(&self) -> bool {
        *self != LoadResult::InProgress
    }
}

/// Invoked once a request resolves, or is cancelled before it did.
pub type LoadCallback = Box<dyn FnOnce(LoadTaskHandle, LoadResult)>;

/// When a callback registered against an already-resolved request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Run it inside the registering call.
    Immediate,
    /// Always run it from the next `advance`.
    Deferred,
}

impl Default for Delivery {
    fn default() -> Self {
        Delivery::Immediate
    }
}

/// A released slot, with what is needed to finish the request.
pub struct Released {
    pub asset: AssetId,
    pub callback: Option<LoadCallback>,
    pub waiting: bool,
}

pub struct TaskTable {
    versions: Vec<u32>,
    assets: Vec<AssetId>,
    callbacks: Vec<Option<LoadCallback>>,
    occupied: Bitmask,
    waiting: Bitmask,
}

impl TaskTable {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut callbacks = Vec::with_capacity(capacity);
        callbacks.resize_with(capacity, || None);

        TaskTable {
            versions: vec![0; capacity],
            assets: vec![AssetId::default(); capacity],
            callbacks,
            occupied: Bitmask::with_capacity(capacity),
            waiting: Bitmask::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.versions.len()
    }

    /// Number of requests that are alive.
    #[inline]
    pub fn len(&self) -> usize {
        self.occupied.count_ones()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn grow(&mut self) {
        let capacity = self.capacity() * 2;
        debug!("Grows loading task table to {} slots.", capacity);

        self.versions.resize(capacity, 0);
        self.assets.resize(capacity, AssetId::default());
        self.callbacks.resize_with(capacity, || None);
        self.occupied.ensure_capacity(capacity);
        self.waiting.ensure_capacity(capacity);
    }

    /// Takes the first free slot for a request of `asset`.
    pub fn alloc(&mut self, asset: AssetId) -> LoadTaskHandle {
        let index = match self.occupied.first_zero() {
            Some(index) => index,
            None => {
                let index = self.capacity();
                self.grow();
                index
            }
        };

        self.occupied.insert(index);
        self.assets[index] = asset;

        let version = bump(&mut self.versions[index]);
        LoadTaskHandle::new(index as u32, version)
    }

    /// Returns true if `handle` names a live request. With `allow_cancelled`,
    /// a cancelled handle is accepted as-is since its slot is gone already.
    pub fn check(&self, handle: LoadTaskHandle, allow_cancelled: bool) -> bool {
        if !handle.is_valid() {
            return false;
        }

        if handle.is_cancelled() {
            return allow_cancelled;
        }

        let index = handle.index as usize;
        index < self.capacity()
            && self.occupied.contains(index)
            && self.versions[index] == handle.version
    }

    /// Returns the asset requested through `handle`.
    pub fn asset(&self, handle: LoadTaskHandle) -> Option<AssetId> {
        if self.check(handle, false) {
            Some(self.assets[handle.index as usize])
        } else {
            None
        }
    }

    /// Parks `callback` until the next sweep that sees the request resolved.
    /// Callbacks parked on the same slot run in registration order.
    pub fn wait(&mut self, handle: LoadTaskHandle, callback: Option<LoadCallback>) {
        if !self.check(handle, false) {
            return;
        }

        let index = handle.index as usize;
        let chained: Option<LoadCallback> = match (self.callbacks[index].take(), callback) {
            (Some(first), Some(second)) => {
                let both: LoadCallback = Box::new(move |h: LoadTaskHandle, r: LoadResult| {
                    first(h, r);
                    second(h, r);
                });

                Some(both)
            }
            (first, second) => first.or(second),
        };

        self.callbacks[index] = chained;
        self.waiting.insert(index);
    }

    #[inline]
    pub fn is_waiting(&self, handle: LoadTaskHandle) -> bool {
        self.check(handle, false) && self.waiting.contains(handle.index as usize)
    }

    /// Live requests whose callbacks are still parked.
    pub fn waiting(&self) -> Vec<(LoadTaskHandle, AssetId)> {
        self.waiting
            .ones()
            .map(|index| {
                let handle = LoadTaskHandle::new(index as u32, self.versions[index]);
                (handle, self.assets[index])
            })
            .collect()
    }

    /// Stops waiting on `handle` and hands out its parked callback.
    pub fn take_callback(&mut self, handle: LoadTaskHandle) -> Option<LoadCallback> {
        if !self.check(handle, false) {
            return None;
        }

        let index = handle.index as usize;
        self.waiting.remove(index);
        self.callbacks[index].take()
    }

    /// Frees the slot of `handle` and invalidates every copy of it.
    pub fn release(&mut self, handle: LoadTaskHandle) -> Option<Released> {
        if !self.check(handle, false) {
            return None;
        }

        let index = handle.index as usize;
        let waiting = self.waiting.contains(index);

        self.occupied.remove(index);
        self.waiting.remove(index);
        bump(&mut self.versions[index]);

        let asset = ::std::mem::replace(&mut self.assets[index], AssetId::default());
        let callback = self.callbacks[index].take();

        Some(Released {
            asset,
            callback,
            waiting,
        })
    }
}

/// Bumps a slot version, skipping zero so no live handle is ever nil.
#[inline]
fn bump(version: &mut u32) -> u32 {
    *version = version.wrapping_add(1);
    if *version == 0 {
        *version = 1;
    }

    *version
}
