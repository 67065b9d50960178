//! The bundle lifecycle engine.
//!
//! Every bundle that somebody asked for owns a `BundleLoad` record, kept in a
//! slot pool and found through its id. The record walks forward through
//!
//! ```text
//! WaitingForMount -> Mounting -> WaitingForDependencies -> Loading -> Loaded
//!                       |                                     |
//!                       +-> ErrorArchive                      +-> ErrorContentFiles
//! ```
//!
//! and back through
//!
//! ```text
//! WaitingToUnload -> Unloading -> WaitingForUnmount -> Unmounting -> (freed)
//! ```
//!
//! Reference counts are driven by `start_loading`/`start_unloading`, which also
//! propagate to the dependencies of a bundle on its 0 <-> 1 transitions. The
//! mount, decode and unload primitives cannot be cancelled, so a change of
//! direction that arrives while one of them is in flight is parked in the
//! `resume`/`reverse` flags and resolved when the operation is observed done.

mod force;
mod tick;

use std::cmp;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::*;
use crate::mapping::{BundleId, DependencyMapping};
use crate::provider::{ArchiveHandle, ContentHandle, UnloadHandle};
use crate::utils::object_pool::ObjectPool;

/// Content handles a bundle is decoded against, in mapping order.
type Dependencies = SmallVec<[ContentHandle; 8]>;

impl_handle!(BundleSlot);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleState {
    WaitingForMount,
    Mounting,
    WaitingForDependencies,
    Loading,

    Loaded,
    ErrorArchive,
    ErrorContentFiles,

    WaitingToUnload,
    Unloading,
    WaitingForUnmount,
    Unmounting,
}

impl BundleState {
    /// Forward phases that have not reached a terminal state yet.
    #[inline]
    pub fn is_loading(self) -> bool {
        match self {
            BundleState::WaitingForMount
            | BundleState::Mounting
            | BundleState::WaitingForDependencies
            | BundleState::Loading => true,
            _ => false,
        }
    }

    #[inline]
    pub fn is_unloading(self) -> bool {
        match self {
            BundleState::WaitingToUnload
            | BundleState::Unloading
            | BundleState::WaitingForUnmount
            | BundleState::Unmounting => true,
            _ => false,
        }
    }

    /// `Loaded` or one of the sticky error states.
    #[inline]
    pub fn is_terminal(self) -> bool {
        match self {
            BundleState::Loaded | BundleState::ErrorArchive | BundleState::ErrorContentFiles => {
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == BundleState::Loaded
    }

    /// Dependants may decode against a bundle in this state. A missing archive
    /// unblocks them, a failed decode does not.
    #[inline]
    pub fn is_dependency_ready(self) -> bool {
        self == BundleState::Loaded || self == BundleState::ErrorArchive
    }

    /// Teardown has reached the archive; readers of this bundle are gone.
    #[inline]
    pub fn is_releasing_archive(self) -> bool {
        self == BundleState::WaitingForUnmount || self == BundleState::Unmounting
    }
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Orders pending work inside a phase. Never preempts anything in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(pub u8);

impl Priority {
    pub const BACKGROUND: Priority = Priority(8);
    pub const LOW: Priority = Priority(32);
    pub const NORMAL: Priority = Priority(64);
    pub const HIGH: Priority = Priority(128);
    pub const URGENT: Priority = Priority(240);

    /// A priority `n` steps above this one, saturating.
    #[inline]
    pub fn above(self, n: u8) -> Priority {
        Priority(self.0.saturating_add(n))
    }

    /// A priority `n` steps below this one, saturating.
    #[inline]
    pub fn below(self, n: u8) -> Priority {
        Priority(self.0.saturating_sub(n))
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

/// Caps on the number of operations in flight, per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub mounts: u32,
    pub content_loads: u32,
    pub unmounts: u32,
    pub content_unloads: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            mounts: 20,
            content_loads: 10,
            unmounts: 20,
            content_unloads: 10,
        }
    }
}

/// Number of operations currently in flight, per phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ongoing {
    pub mounts: u32,
    pub content_loads: u32,
    pub unmounts: u32,
    pub content_unloads: u32,
}

/// A snapshot of one tracked bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleInfo {
    pub bundle: BundleId,
    pub state: BundleState,
    pub references: u32,
    pub priority: Priority,
}

#[derive(Debug)]
struct BundleLoad {
    bundle: BundleId,
    state: BundleState,
    references: u32,
    priority: Priority,

    // Parked direction changes, see module docs.
    resume: bool,
    reverse: bool,

    archive: ArchiveHandle,
    archive_failed: bool,
    content: ContentHandle,
    content_failed: bool,
    unload: UnloadHandle,
}

impl BundleLoad {
    fn new(bundle: BundleId, priority: Priority) -> Self {
        BundleLoad {
            bundle,
            state: BundleState::WaitingForMount,
            references: 1,
            priority,
            resume: false,
            reverse: false,
            archive: ArchiveHandle::nil(),
            archive_failed: false,
            content: ContentHandle::nil(),
            content_failed: false,
            unload: UnloadHandle::nil(),
        }
    }

    fn info(&self) -> BundleInfo {
        BundleInfo {
            bundle: self.bundle,
            state: self.state,
            references: self.references,
            priority: self.priority,
        }
    }
}

pub struct Lifecycle {
    namespace: String,
    archives: PathBuf,
    limits: Limits,
    ongoing: Ongoing,
    paused: bool,

    loads: ObjectPool<BundleSlot, BundleLoad>,
    redirects: HashMap<BundleId, BundleSlot>,
}

impl Lifecycle {
    /// Creates an empty engine that mounts archives from `archives`.
    pub fn new<T1, T2>(namespace: T1, archives: T2, limits: Limits) -> Self
    where
        T1: Into<String>,
        T2: AsRef<Path>,
    {
        Lifecycle {
            namespace: namespace.into(),
            archives: archives.as_ref().to_owned(),
            limits,
            ongoing: Ongoing::default(),
            paused: false,
            loads: ObjectPool::new(),
            redirects: HashMap::new(),
        }
    }

    #[inline]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Replaces the concurrency caps. Operations already in flight are kept
    /// even if they now exceed the new caps.
    #[inline]
    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    #[inline]
    pub fn ongoing(&self) -> Ongoing {
        self.ongoing
    }

    /// Suspends or resumes `advance`. Reference counting keeps working.
    #[inline]
    pub fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    fn lookup(&self, bundle: BundleId) -> Option<BundleSlot> {
        self.redirects
            .get(&bundle)
            .cloned()
            .filter(|&slot| self.loads.contains(slot))
    }

    #[inline]
    fn state_of(&self, bundle: BundleId) -> Option<BundleState> {
        self.lookup(bundle)
            .and_then(|slot| self.loads.get(slot))
            .map(|v| v.state)
    }

    /// Returns the state of `bundle`, or `None` if it is not tracked.
    #[inline]
    pub fn state(&self, bundle: BundleId) -> Option<BundleState> {
        self.state_of(bundle)
    }

    #[inline]
    pub fn references(&self, bundle: BundleId) -> Option<u32> {
        self.lookup(bundle)
            .and_then(|slot| self.loads.get(slot))
            .map(|v| v.references)
    }

    /// Returns the decoded content of `bundle` if it is `Loaded`.
    pub fn content(&self, bundle: BundleId) -> Option<ContentHandle> {
        self.lookup(bundle)
            .and_then(|slot| self.loads.get(slot))
            .filter(|v| v.state.is_success())
            .map(|v| v.content)
    }

    #[inline]
    pub fn contains(&self, bundle: BundleId) -> bool {
        self.lookup(bundle).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.loads.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    /// Snapshot of every tracked bundle, in slot order.
    pub fn bundles(&self) -> Vec<BundleInfo> {
        self.loads.iter().map(|(_, v)| v.info()).collect()
    }

    /// Takes a reference to `bundle`. The first reference creates the record
    /// (or turns a teardown around) and recursively references every real
    /// dependency, so dependencies are always requested at least as early and
    /// held at least as long as their dependants.
    pub fn start_loading(
        &mut self,
        mapping: &DependencyMapping,
        bundle: BundleId,
        priority: Priority,
    ) -> BundleSlot {
        let slot = match self.lookup(bundle) {
            Some(slot) => slot,
            None => {
                let slot = self.loads.create(BundleLoad::new(bundle, priority));
                self.redirects.insert(bundle, slot);
                trace!("Bundle {} registered with priority {}.", bundle, priority.0);

                self.start_loading_dependencies(mapping, bundle, priority);
                return slot;
            }
        };

        if let Some(load) = self.loads.get_mut(slot) {
            load.references += 1;
            if load.references > 1 {
                load.priority = cmp::max(load.priority, priority);
                return slot;
            }

            load.priority = priority;
            load.reverse = false;

            match load.state {
                BundleState::WaitingToUnload => {
                    load.state = if load.content_failed {
                        BundleState::ErrorContentFiles
                    } else {
                        BundleState::Loaded
                    };
                }
                BundleState::WaitingForUnmount => {
                    load.state = if load.archive_failed {
                        BundleState::ErrorArchive
                    } else {
                        BundleState::WaitingForDependencies
                    };
                }
                BundleState::Unloading | BundleState::Unmounting => load.resume = true,
                _ => {}
            }

            trace!("Bundle {} resumed in {}.", bundle, load.state);
        }

        self.start_loading_dependencies(mapping, bundle, priority);
        slot
    }

    fn start_loading_dependencies(
        &mut self,
        mapping: &DependencyMapping,
        bundle: BundleId,
        priority: Priority,
    ) {
        for &dependency in mapping.dependencies(bundle) {
            if !dependency.is_sentinel() {
                self.start_loading(mapping, dependency, priority);
            }
        }
    }

    /// Releases a reference to `bundle`. The last reference starts teardown
    /// and releases the references this bundle holds on its dependencies.
    pub fn start_unloading(
        &mut self,
        mapping: &DependencyMapping,
        bundle: BundleId,
        priority: Priority,
    ) -> Result<()> {
        let slot = self
            .lookup(bundle)
            .ok_or_else(|| Error::BundleNotTracked(bundle))?;

        let load = self
            .loads
            .get_mut(slot)
            .ok_or_else(|| Error::BundleNotTracked(bundle))?;

        if load.references == 0 {
            return Err(Error::BundleNotTracked(bundle));
        }

        load.references -= 1;
        if load.references > 0 {
            return Ok(());
        }

        load.resume = false;
        load.priority = priority;

        match load.state {
            BundleState::WaitingForMount => {
                // Nothing mounted yet, the slot is released on next advance.
                load.state = BundleState::Unmounting;
                self.ongoing.unmounts += 1;
            }
            BundleState::Mounting | BundleState::Loading => load.reverse = true,
            BundleState::WaitingForDependencies | BundleState::ErrorArchive => {
                load.state = BundleState::WaitingForUnmount;
            }
            BundleState::Loaded | BundleState::ErrorContentFiles => {
                load.state = BundleState::WaitingToUnload;
            }
            _ => {}
        }

        trace!("Bundle {} released in {}.", bundle, load.state);

        for &dependency in mapping.dependencies(bundle) {
            if dependency.is_sentinel() {
                continue;
            }

            if let Err(err) = self.start_unloading(mapping, dependency, priority) {
                error!("Failed to release dependency of bundle {}: {}", bundle, err);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;
    use crate::mapping::MappingBuilder;

    fn bundle(n: u128) -> BundleId {
        BundleId::new(Uuid::from_u128(n))
    }

    #[test]
    fn priority() {
        assert_eq!(Priority::NORMAL.above(1), Priority(65));
        assert_eq!(Priority::URGENT.above(100), Priority(255));
        assert_eq!(Priority::BACKGROUND.below(100), Priority(0));
        assert!(Priority::HIGH > Priority::LOW);
        assert_eq!(Priority::default(), Priority::NORMAL);
    }

    #[test]
    fn states() {
        assert!(BundleState::Mounting.is_loading());
        assert!(BundleState::ErrorArchive.is_terminal());
        assert!(!BundleState::ErrorArchive.is_success());
        assert!(BundleState::Unloading.is_unloading());
        assert!(BundleState::Unmounting.is_releasing_archive());
        assert!(!BundleState::WaitingToUnload.is_releasing_archive());
    }

    #[test]
    fn reference_propagation() {
        let (a, b, c) = (bundle(1), bundle(2), bundle(3));
        let mapping = MappingBuilder::new()
            .bundle(a, vec![b, BundleId::sentinel()])
            .bundle(b, vec![c])
            .bundle(c, vec![])
            .build();

        let mut lifecycle = Lifecycle::new("test", "archives", Limits::default());
        lifecycle.start_loading(&mapping, a, Priority::HIGH);
        lifecycle.start_loading(&mapping, a, Priority::LOW);
        lifecycle.start_loading(&mapping, b, Priority::LOW);

        assert_eq!(lifecycle.references(a), Some(2));
        assert_eq!(lifecycle.references(b), Some(2));
        assert_eq!(lifecycle.references(c), Some(1));
        assert_eq!(lifecycle.len(), 3);
        assert!(!lifecycle.contains(BundleId::sentinel()));
        assert_eq!(lifecycle.bundles()[0].priority, Priority::HIGH);

        lifecycle.start_unloading(&mapping, a, Priority::NORMAL).unwrap();
        assert_eq!(lifecycle.references(a), Some(1));

        lifecycle.start_unloading(&mapping, a, Priority::NORMAL).unwrap();
        assert_eq!(lifecycle.references(a), Some(0));
        assert_eq!(lifecycle.references(b), Some(1));
        assert_eq!(lifecycle.references(c), Some(1));

        // Nothing was mounted yet, so teardown skips straight to unmounting.
        assert_eq!(lifecycle.state(a), Some(BundleState::Unmounting));
        assert_eq!(lifecycle.ongoing().unmounts, 1);

        assert!(lifecycle.start_unloading(&mapping, a, Priority::NORMAL).is_err());
        assert!(lifecycle
            .start_unloading(&mapping, bundle(9), Priority::NORMAL)
            .is_err());
    }
}
