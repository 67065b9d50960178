use crate::errors::*;
use crate::mapping::{BundleId, DependencyMapping};
use crate::provider::{AssetProvider, ContentHandle, OpStatus};

use super::tick::content_path;
use super::{BundleState, Dependencies, Lifecycle};

impl Lifecycle {
    /// Drives `bundle` and its whole dependency chain to a terminal state right
    /// now, blocking on the provider and ignoring the concurrency caps.
    ///
    /// Only forward phases are driven. A bundle without references, or one
    /// that is already tearing down, is left alone and its current state is
    /// returned; the pass-based engine resolves it later.
    pub fn force_load(
        &mut self,
        mapping: &DependencyMapping,
        provider: &mut dyn AssetProvider,
        bundle: BundleId,
    ) -> Result<BundleState> {
        let mut visiting = Vec::new();
        self.force_load_rec(mapping, provider, bundle, &mut visiting)
    }

    fn force_load_rec(
        &mut self,
        mapping: &DependencyMapping,
        provider: &mut dyn AssetProvider,
        bundle: BundleId,
        visiting: &mut Vec<BundleId>,
    ) -> Result<BundleState> {
        let slot = self
            .lookup(bundle)
            .ok_or_else(|| Error::BundleNotTracked(bundle))?;

        let (state, references) = match self.loads.get(slot) {
            Some(load) => (load.state, load.references),
            None => return Err(Error::BundleNotTracked(bundle)),
        };

        if state.is_terminal() || visiting.contains(&bundle) {
            return Ok(state);
        }

        if references == 0 || state.is_unloading() {
            warn!(
                "Can not force bundle {} while it is being released ({}).",
                bundle, state
            );
            return Ok(state);
        }

        visiting.push(bundle);

        let mut dependencies = Dependencies::new();
        for &dependency in mapping.dependencies(bundle) {
            if dependency.is_sentinel() {
                dependencies.push(ContentHandle::global());
                continue;
            }

            match self.force_load_rec(mapping, provider, dependency, visiting)? {
                BundleState::Loaded => {
                    dependencies.push(self.content(dependency).unwrap_or_default());
                }
                BundleState::ErrorArchive => {
                    dependencies.push(ContentHandle::nil());
                }
                other => {
                    warn!(
                        "Can not force bundle {}, dependency {} is {}.",
                        bundle, dependency, other
                    );

                    visiting.pop();
                    return Ok(state);
                }
            }
        }

        visiting.pop();

        let load = match self.loads.get_mut(slot) {
            Some(load) => load,
            None => return Err(Error::BundleNotTracked(bundle)),
        };

        if load.state == BundleState::WaitingForMount {
            let path = self.archives.join(bundle.file_name());
            load.archive = provider.mount(&self.namespace, &path);
            load.state = BundleState::Mounting;
            self.ongoing.mounts += 1;
        }

        if load.state == BundleState::Mounting {
            let status = provider.wait_archive(load.archive);
            self.ongoing.mounts -= 1;

            if status == OpStatus::Failed {
                warn!("Failed to mount archive of bundle {}.", bundle);
                load.archive_failed = true;
                load.state = BundleState::ErrorArchive;
                return Ok(load.state);
            }

            load.state = BundleState::WaitingForDependencies;
        }

        if load.state == BundleState::WaitingForDependencies {
            let path = content_path(provider, load.archive, bundle);
            load.content = provider.load_content(&self.namespace, &path, &dependencies);
            load.state = BundleState::Loading;
            self.ongoing.content_loads += 1;
        }

        if load.state == BundleState::Loading {
            let status = provider.wait_content(load.content);
            self.ongoing.content_loads -= 1;

            if status == OpStatus::Failed {
                warn!("Failed to load content of bundle {}.", bundle);
                load.content_failed = true;
                load.state = BundleState::ErrorContentFiles;
            } else {
                load.state = BundleState::Loaded;
            }
        }

        debug!("Forced bundle {} to {}.", bundle, load.state);
        Ok(load.state)
    }
}
