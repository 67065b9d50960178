use crate::mapping::{BundleId, DependencyMapping};
use crate::provider::{ArchiveHandle, AssetProvider, ContentHandle, OpStatus, UnloadHandle};

use super::{BundleSlot, BundleState, Dependencies, Lifecycle};

impl Lifecycle {
    /// Runs one pass of every phase, in order. Each phase only looks at the
    /// records that were in its entry state when it started, so a bundle moves
    /// at most one step per phase and never gets scheduled twice in a pass.
    pub fn advance(&mut self, mapping: &DependencyMapping, provider: &mut dyn AssetProvider) {
        if self.paused {
            return;
        }

        self.begin_mount(provider);
        self.finish_mount(provider);
        self.begin_load(mapping, provider);
        self.finish_load(provider);
        self.begin_unload(mapping, provider);
        self.finish_unload(provider);
        self.finish_unmount();
        self.begin_unmount(mapping, provider);
    }

    /// Slots in `state`, highest priority first. Ties keep slot order.
    fn pending(&self, state: BundleState) -> Vec<BundleSlot> {
        let mut slots: Vec<_> = self
            .loads
            .iter()
            .filter(|(_, v)| v.state == state)
            .map(|(slot, v)| (slot, v.priority))
            .collect();

        slots.sort_by(|lhs, rhs| rhs.1.cmp(&lhs.1));
        slots.into_iter().map(|(slot, _)| slot).collect()
    }

    fn begin_mount(&mut self, provider: &mut dyn AssetProvider) {
        for slot in self.pending(BundleState::WaitingForMount) {
            if self.ongoing.mounts >= self.limits.mounts {
                break;
            }

            if let Some(load) = self.loads.get_mut(slot) {
                let path = self.archives.join(load.bundle.file_name());
                load.archive = provider.mount(&self.namespace, &path);
                load.state = BundleState::Mounting;
                self.ongoing.mounts += 1;

                debug!("Mounts archive {:?} of bundle {}.", path, load.bundle);
            }
        }
    }

    fn finish_mount(&mut self, provider: &mut dyn AssetProvider) {
        for slot in self.pending(BundleState::Mounting) {
            if let Some(load) = self.loads.get_mut(slot) {
                let status = provider.archive_status(load.archive);
                if !status.is_done() {
                    continue;
                }

                self.ongoing.mounts -= 1;
                load.archive_failed = status == OpStatus::Failed;

                if load.reverse {
                    load.reverse = false;
                    load.state = BundleState::WaitingForUnmount;
                } else if load.archive_failed {
                    warn!("Failed to mount archive of bundle {}.", load.bundle);
                    load.state = BundleState::ErrorArchive;
                } else {
                    load.state = BundleState::WaitingForDependencies;
                }

                trace!("Bundle {} mounted, now {}.", load.bundle, load.state);
            }
        }
    }

    /// Collects the content handles `bundle` decodes against, or `None` if
    /// some real dependency is neither `Loaded` nor `ErrorArchive`. A missing
    /// archive is passed as the nil handle.
    fn resolve_dependencies(
        &self,
        mapping: &DependencyMapping,
        bundle: BundleId,
    ) -> Option<Dependencies> {
        let mut handles = Dependencies::new();

        for &dependency in mapping.dependencies(bundle) {
            if dependency.is_sentinel() {
                handles.push(ContentHandle::global());
                continue;
            }

            let load = self
                .lookup(dependency)
                .and_then(|slot| self.loads.get(slot))?;

            match load.state {
                BundleState::Loaded => handles.push(load.content),
                BundleState::ErrorArchive => handles.push(ContentHandle::nil()),
                _ => return None,
            }
        }

        Some(handles)
    }

    fn begin_load(&mut self, mapping: &DependencyMapping, provider: &mut dyn AssetProvider) {
        for slot in self.pending(BundleState::WaitingForDependencies) {
            if self.ongoing.content_loads >= self.limits.content_loads {
                break;
            }

            let bundle = match self.loads.get(slot) {
                Some(load) => load.bundle,
                None => continue,
            };

            let dependencies = match self.resolve_dependencies(mapping, bundle) {
                Some(dependencies) => dependencies,
                None => continue,
            };

            if let Some(load) = self.loads.get_mut(slot) {
                let path = content_path(provider, load.archive, bundle);
                load.content = provider.load_content(&self.namespace, &path, &dependencies);
                load.state = BundleState::Loading;
                self.ongoing.content_loads += 1;

                debug!(
                    "Loads content {} of bundle {} with {} dependencies.",
                    path,
                    bundle,
                    dependencies.len()
                );
            }
        }
    }

    fn finish_load(&mut self, provider: &mut dyn AssetProvider) {
        for slot in self.pending(BundleState::Loading) {
            if let Some(load) = self.loads.get_mut(slot) {
                let status = provider.content_status(load.content);
                if !status.is_done() {
                    continue;
                }

                self.ongoing.content_loads -= 1;
                load.content_failed = status == OpStatus::Failed;

                if load.reverse {
                    load.reverse = false;
                    load.state = BundleState::WaitingToUnload;
                } else if load.content_failed {
                    warn!("Failed to load content of bundle {}.", load.bundle);
                    load.state = BundleState::ErrorContentFiles;
                } else {
                    load.state = BundleState::Loaded;
                }

                trace!("Bundle {} decoded, now {}.", load.bundle, load.state);
            }
        }
    }

    /// Returns true if every tracked dependant of `bundle` satisfies `released`.
    /// Dependants that are not tracked at all are gone already.
    fn dependants_are<F>(&self, mapping: &DependencyMapping, bundle: BundleId, released: F) -> bool
    where
        F: Fn(BundleState) -> bool,
    {
        mapping.dependants(bundle).iter().all(|&dependant| {
            self.lookup(dependant)
                .and_then(|slot| self.loads.get(slot))
                .map(|v| released(v.state))
                .unwrap_or(true)
        })
    }

    fn begin_unload(&mut self, mapping: &DependencyMapping, provider: &mut dyn AssetProvider) {
        for slot in self.pending(BundleState::WaitingToUnload) {
            if self.ongoing.content_unloads >= self.limits.content_unloads {
                break;
            }

            let bundle = match self.loads.get(slot) {
                Some(load) => load.bundle,
                None => continue,
            };

            // Content goes once no dependant can decode against it any more.
            if !self.dependants_are(mapping, bundle, BundleState::is_releasing_archive) {
                continue;
            }

            if let Some(load) = self.loads.get_mut(slot) {
                load.unload = provider.unload_content(load.content);
                load.state = BundleState::Unloading;
                self.ongoing.content_unloads += 1;

                debug!("Unloads content of bundle {}.", bundle);
            }
        }
    }

    fn finish_unload(&mut self, provider: &mut dyn AssetProvider) {
        for slot in self.pending(BundleState::Unloading) {
            if let Some(load) = self.loads.get_mut(slot) {
                if !provider.is_unloaded(load.unload) {
                    continue;
                }

                self.ongoing.content_unloads -= 1;
                load.unload = UnloadHandle::nil();
                load.content = ContentHandle::nil();
                load.content_failed = false;

                if load.resume {
                    load.resume = false;
                    load.state = BundleState::WaitingForDependencies;
                } else {
                    load.state = BundleState::WaitingForUnmount;
                }

                trace!("Bundle {} unloaded, now {}.", load.bundle, load.state);
            }
        }
    }

    /// Unmounts never report completion, so a bundle spends exactly one pass
    /// in `Unmounting` before its slot is released or reused.
    fn finish_unmount(&mut self) {
        for slot in self.pending(BundleState::Unmounting) {
            self.ongoing.unmounts -= 1;

            let resume = match self.loads.get_mut(slot) {
                Some(load) if load.resume => {
                    load.resume = false;
                    load.state = BundleState::WaitingForMount;
                    load.archive_failed = false;
                    load.content_failed = false;
                    load.archive = ArchiveHandle::nil();
                    load.content = ContentHandle::nil();
                    load.unload = UnloadHandle::nil();

                    trace!("Bundle {} unmounted, mounting again.", load.bundle);
                    true
                }
                _ => false,
            };

            if !resume {
                if let Some(load) = self.loads.free(slot) {
                    self.redirects.remove(&load.bundle);
                    trace!("Bundle {} released.", load.bundle);
                }
            }
        }
    }

    fn begin_unmount(&mut self, mapping: &DependencyMapping, provider: &mut dyn AssetProvider) {
        for slot in self.pending(BundleState::WaitingForUnmount) {
            if self.ongoing.unmounts >= self.limits.unmounts {
                break;
            }

            let bundle = match self.loads.get(slot) {
                Some(load) => load.bundle,
                None => continue,
            };

            // The archive goes only after every dependant began unmounting.
            if !self.dependants_are(mapping, bundle, |v| v == BundleState::Unmounting) {
                continue;
            }

            if let Some(load) = self.loads.get_mut(slot) {
                if load.archive.is_valid() {
                    provider.unmount(load.archive);
                }

                load.state = BundleState::Unmounting;
                self.ongoing.unmounts += 1;

                debug!("Unmounts archive of bundle {}.", bundle);
            }
        }
    }
}

/// Location of the content file of `bundle` inside its mounted archive.
pub(super) fn content_path(
    provider: &dyn AssetProvider,
    archive: ArchiveHandle,
    bundle: BundleId,
) -> String {
    let prefix = provider.mount_path(archive).unwrap_or_default();
    format!("{}{}", prefix, bundle.file_name())
}
