//! The `BundleSystem` ties the dependency mapping, the lifecycle engine and the
//! loading task table together behind one context object.
//!
//! All methods are expected to be called from the thread that drives
//! `advance`, once per host frame.

use crate::errors::*;
use crate::lifecycle::{BundleInfo, BundleState, Lifecycle, Limits, Ongoing, Priority};
use crate::mapping::{AssetId, BundleId, DependencyMapping};
use crate::params::BundleParams;
use crate::provider::disk::DirectoryProvider;
use crate::provider::AssetProvider;
use crate::tasks::{Delivery, LoadCallback, LoadResult, LoadTaskHandle, LoadedContent, TaskTable};

pub struct BundleSystem<P: AssetProvider> {
    mapping: DependencyMapping,
    lifecycle: Lifecycle,
    tasks: TaskTable,
    provider: P,
}

impl BundleSystem<DirectoryProvider> {
    /// Creates a system streaming bundles from the folders under
    /// `params.base_dir`.
    pub fn from_directory(params: BundleParams) -> Result<Self> {
        let provider = DirectoryProvider::new(params.workers)?;
        BundleSystem::new(params, provider)
    }
}

impl<P: AssetProvider> BundleSystem<P> {
    /// Creates a new `BundleSystem`, loading the dependency mapping from
    /// `params.base_dir` if build data is enabled.
    pub fn new(params: BundleParams, provider: P) -> Result<Self> {
        let mapping = if params.use_build_data {
            DependencyMapping::load(params.mapping_file())?
        } else {
            info!("Build data disabled, bundle mapping is empty.");
            DependencyMapping::default()
        };

        Ok(BundleSystem::with_mapping(params, mapping, provider))
    }

    /// Creates a new `BundleSystem` with an already built mapping.
    pub fn with_mapping(params: BundleParams, mapping: DependencyMapping, provider: P) -> Self {
        let lifecycle = Lifecycle::new(
            params.namespace.as_str(),
            params.archives_dir(),
            params.limits,
        );

        BundleSystem {
            mapping,
            lifecycle,
            tasks: TaskTable::new(params.initial_task_capacity),
            provider,
        }
    }

    #[inline]
    pub fn mapping(&self) -> &DependencyMapping {
        &self.mapping
    }

    #[inline]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[inline]
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Applies new concurrency caps, effective from the next `advance`.
    pub fn setup(&mut self, limits: Limits) {
        info!("Bundle limits changed to {:?}.", limits);
        self.lifecycle.set_limits(limits);
    }

    #[inline]
    pub fn limits(&self) -> Limits {
        self.lifecycle.limits()
    }

    /// Stops or restarts lifecycle progress. Callbacks of requests that are
    /// already resolved keep being delivered.
    #[inline]
    pub fn pause(&mut self, paused: bool) {
        self.lifecycle.pause(paused);
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.lifecycle.is_paused()
    }

    /// Advances every bundle by at most one step per phase, then delivers the
    /// callbacks of every request that became resolved.
    pub fn advance(&mut self) {
        self.lifecycle.advance(&self.mapping, &mut self.provider);
        self.sweep();
    }

    fn sweep(&mut self) {
        let mut ready = Vec::new();
        for (handle, asset) in self.tasks.waiting() {
            let result = self.result_of(asset);
            if result.is_done() {
                ready.push((handle, result));
            }
        }

        for (handle, result) in ready {
            if let Some(callback) = self.tasks.take_callback(handle) {
                callback(handle, result);
            }
        }
    }

    fn resolve(&self, asset: AssetId) -> Result<BundleId> {
        match self.mapping.resolve(asset) {
            Some(bundle) => Ok(bundle),
            None => {
                error!("Asset {} not found in bundle mapping.", asset);
                Err(Error::AssetNotFound(asset))
            }
        }
    }

    fn result_of(&self, asset: AssetId) -> LoadResult {
        let bundle = match self.mapping.resolve(asset) {
            Some(bundle) => bundle,
            None => return LoadResult::Invalid,
        };

        match self.lifecycle.state(bundle) {
            None => LoadResult::Invalid,
            Some(state) if !state.is_terminal() => LoadResult::InProgress,
            Some(BundleState::Loaded) => match self.content(asset) {
                Some(content) => LoadResult::Success(content),
                None => LoadResult::Fail,
            },
            Some(_) => LoadResult::Fail,
        }
    }

    /// Takes a reference to `bundle` and everything it depends on.
    pub fn start_loading_bundle(&mut self, bundle: BundleId, priority: Priority) {
        if bundle.is_sentinel() {
            warn!("The global bundle is always resident.");
            return;
        }

        self.lifecycle.start_loading(&self.mapping, bundle, priority);
    }

    /// Releases a reference to `bundle`. Every call must pair with exactly one
    /// earlier `start_loading_bundle`.
    pub fn start_unloading_bundle(&mut self, bundle: BundleId, priority: Priority) -> Result<()> {
        self.lifecycle
            .start_unloading(&self.mapping, bundle, priority)
            .map_err(|err| {
                error!("Failed to unload bundle {}: {}", bundle, err);
                err
            })
    }

    /// Takes a reference to the bundle holding `asset`.
    pub fn start_loading(&mut self, asset: AssetId, priority: Priority) -> Result<()> {
        let bundle = self.resolve(asset)?;
        self.start_loading_bundle(bundle, priority);
        Ok(())
    }

    /// Releases a reference to the bundle holding `asset`.
    pub fn start_unloading(&mut self, asset: AssetId, priority: Priority) -> Result<()> {
        let bundle = self.resolve(asset)?;
        self.start_unloading_bundle(bundle, priority)
    }

    /// Requests `asset` without a callback. Progress is observed with `poll`.
    pub fn load(&mut self, asset: AssetId, priority: Priority) -> Result<LoadTaskHandle> {
        let bundle = self.resolve(asset)?;
        self.start_loading_bundle(bundle, priority);
        Ok(self.tasks.alloc(asset))
    }

    /// Requests `asset`, and invokes `callback` once its bundle settles in a
    /// terminal state or the request gets cancelled first.
    pub fn load_async<F>(
        &mut self,
        asset: AssetId,
        callback: F,
        delivery: Delivery,
        priority: Priority,
    ) -> Result<LoadTaskHandle>
    where
        F: FnOnce(LoadTaskHandle, LoadResult) + 'static,
    {
        let handle = self.load(asset, priority)?;
        self.deliver(handle, asset, Box::new(callback), delivery);
        Ok(handle)
    }

    fn deliver(
        &mut self,
        handle: LoadTaskHandle,
        asset: AssetId,
        callback: LoadCallback,
        delivery: Delivery,
    ) {
        let result = self.result_of(asset);
        if delivery == Delivery::Immediate && result.is_done() {
            callback(handle, result);
        } else {
            self.tasks.wait(handle, Some(callback));
        }
    }

    /// Adds another callback to a live request. A cancelled handle gets its
    /// callback invoked right away with `LoadResult::Cancelled`.
    pub fn add_callback<F>(
        &mut self,
        handle: LoadTaskHandle,
        callback: F,
        delivery: Delivery,
    ) -> Result<()>
    where
        F: FnOnce(LoadTaskHandle, LoadResult) + 'static,
    {
        if !self.tasks.check(handle, true) {
            error!("Callback won't be called because added to invalid handle {}.", handle);
            return Err(Error::InvalidHandle(handle));
        }

        if handle.is_cancelled() {
            callback(handle, LoadResult::Cancelled);
            return Ok(());
        }

        match self.tasks.asset(handle) {
            Some(asset) => {
                self.deliver(handle, asset, Box::new(callback), delivery);
                Ok(())
            }
            None => Err(Error::InvalidHandle(handle)),
        }
    }

    /// Cancels the request named by `handle` and releases its reference.
    /// `handle` is overwritten with its cancelled copy, which keeps polling as
    /// `Cancelled`; every other copy of the old handle polls as `Invalid`.
    pub fn unload_async(&mut self, handle: &mut LoadTaskHandle) -> Result<()> {
        let original = *handle;
        *handle = original.cancelled();

        if !self.tasks.check(original, false) {
            error!("Loading task {} is invalid.", original);
            return Err(Error::InvalidHandle(original));
        }

        let released = match self.tasks.release(original) {
            Some(released) => released,
            None => return Err(Error::InvalidHandle(original)),
        };

        // Nobody will ever deliver a request that is gone, so waiters learn
        // about the cancellation now.
        if released.waiting && !self.result_of(released.asset).is_done() {
            if let Some(callback) = released.callback {
                callback(*handle, LoadResult::Cancelled);
            }
        }

        self.start_unloading(released.asset, Priority::default())
    }

    /// Polls the request named by `handle`.
    pub fn poll(&self, handle: LoadTaskHandle) -> LoadResult {
        if !self.tasks.check(handle, true) {
            error!("Loading task {} is invalid.", handle);
            return LoadResult::Invalid;
        }

        if handle.is_cancelled() {
            return LoadResult::Cancelled;
        }

        match self.tasks.asset(handle) {
            Some(asset) => self.result_of(asset),
            None => LoadResult::Invalid,
        }
    }

    /// Returns the asset requested through `handle`.
    pub fn requested_asset(&self, handle: LoadTaskHandle) -> Option<AssetId> {
        self.tasks.asset(handle)
    }

    /// Returns true if the bundle holding `asset` is tracked in any state.
    pub fn is_active(&self, asset: AssetId) -> bool {
        self.mapping
            .resolve(asset)
            .map(|bundle| self.lifecycle.contains(bundle))
            .unwrap_or(false)
    }

    /// Returns true if the bundle holding `asset` is tracked but has not
    /// settled in a terminal state.
    pub fn is_loading(&self, asset: AssetId) -> bool {
        self.asset_state(asset)
            .map(|v| !v.is_terminal())
            .unwrap_or(false)
    }

    /// Returns true if the bundle holding `asset` settled, successfully or not.
    pub fn is_loaded(&self, asset: AssetId) -> bool {
        self.asset_state(asset)
            .map(|v| v.is_terminal())
            .unwrap_or(false)
    }

    pub fn is_successfully_loaded(&self, asset: AssetId) -> bool {
        self.asset_state(asset)
            .map(|v| v.is_success())
            .unwrap_or(false)
    }

    /// Returns true if `asset` can be requested at all.
    pub fn can_load(&self, asset: AssetId) -> bool {
        if self.mapping.contains_asset(asset) {
            true
        } else {
            error!("Asset {} not found in bundle mapping.", asset);
            false
        }
    }

    fn asset_state(&self, asset: AssetId) -> Option<BundleState> {
        self.mapping
            .resolve(asset)
            .and_then(|bundle| self.lifecycle.state(bundle))
    }

    /// Returns the content of `asset` if its bundle is loaded. Never blocks.
    pub fn content(&self, asset: AssetId) -> Option<LoadedContent> {
        let bundle = self.mapping.resolve(asset)?;
        let content = self.lifecycle.content(bundle)?;

        Some(LoadedContent {
            content,
            local_offset: self.mapping.local_offset(asset).unwrap_or(0),
        })
    }

    /// Returns the content of `asset`, blocking until its bundle and all of
    /// its dependencies settle. The bundle must already be referenced.
    pub fn force_content(&mut self, asset: AssetId) -> Result<Option<LoadedContent>> {
        let bundle = self.resolve(asset)?;
        if !self.lifecycle.contains(bundle) {
            error!("Asset {} has not started loading.", asset);
            return Err(Error::BundleNotTracked(bundle));
        }

        self.force_load(bundle)?;
        Ok(self.content(asset))
    }

    /// Drives `bundle` and its dependencies to a terminal state right now,
    /// ignoring the concurrency caps.
    pub fn force_load(&mut self, bundle: BundleId) -> Result<BundleState> {
        self.lifecycle
            .force_load(&self.mapping, &mut self.provider, bundle)
    }

    #[inline]
    pub fn state(&self, bundle: BundleId) -> Option<BundleState> {
        self.lifecycle.state(bundle)
    }

    #[inline]
    pub fn references(&self, bundle: BundleId) -> Option<u32> {
        self.lifecycle.references(bundle)
    }

    /// Snapshot of every tracked bundle.
    #[inline]
    pub fn bundles(&self) -> Vec<BundleInfo> {
        self.lifecycle.bundles()
    }

    #[inline]
    pub fn ongoing(&self) -> Ongoing {
        self.lifecycle.ongoing()
    }

    /// Number of live loading requests.
    #[inline]
    pub fn tasks(&self) -> usize {
        self.tasks.len()
    }
}
