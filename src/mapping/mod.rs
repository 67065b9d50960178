//! The dependency mapping produced by the offline build.
//!
//! It answers three questions at runtime: which bundle holds an asset (and
//! where inside it), which bundles a bundle needs before it can be read, and
//! which bundles need it in turn. The mapping is built once and never mutated;
//! the lifecycle engine only reads from it.

mod format;
mod ids;

pub use self::ids::{AssetId, BundleId};

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::errors::*;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DependencyMapping {
    assets: HashMap<AssetId, BundleId>,
    offsets: HashMap<AssetId, u64>,
    dependencies: HashMap<BundleId, Vec<BundleId>>,
    dependants: HashMap<BundleId, Vec<BundleId>>,
}

impl DependencyMapping {
    /// Loads the mapping file at `path`. A missing file is not an error: the
    /// empty mapping is returned and nothing will be loadable through it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Cannot find bundle mapping file {:?}, build data is not available.",
                path
            );
            return Ok(DependencyMapping::default());
        }

        let mut file = BufReader::new(File::open(path)?);
        let mapping = Self::read_from(&mut file)?;

        info!(
            "Loads bundle mapping {:?} with {} assets in {} bundles.",
            path,
            mapping.assets.len(),
            mapping.dependencies.len()
        );

        Ok(mapping)
    }

    /// Resolves the bundle that holds `asset`.
    #[inline]
    pub fn resolve(&self, asset: AssetId) -> Option<BundleId> {
        self.assets.get(&asset).cloned()
    }

    /// Position of the data of `asset` inside its bundle.
    #[inline]
    pub fn local_offset(&self, asset: AssetId) -> Option<u64> {
        self.offsets.get(&asset).cloned()
    }

    /// Ordered dependency list of `bundle`. Entries may be the sentinel id.
    #[inline]
    pub fn dependencies(&self, bundle: BundleId) -> &[BundleId] {
        self.dependencies
            .get(&bundle)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Bundles that list `bundle` as one of their dependencies.
    #[inline]
    pub fn dependants(&self, bundle: BundleId) -> &[BundleId] {
        self.dependants
            .get(&bundle)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    #[inline]
    pub fn contains_asset(&self, asset: AssetId) -> bool {
        self.assets.contains_key(&asset)
    }

    #[inline]
    pub fn contains_bundle(&self, bundle: BundleId) -> bool {
        self.dependencies.contains_key(&bundle)
    }

    pub fn assets(&self) -> impl Iterator<Item = (AssetId, BundleId)> + '_ {
        self.assets.iter().map(|(&k, &v)| (k, v))
    }

    pub fn bundles(&self) -> impl Iterator<Item = BundleId> + '_ {
        self.dependencies.keys().cloned()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.dependencies.is_empty()
    }
}

/// Assembles a `DependencyMapping` the way the build step does, deriving the
/// reverse edges from the dependency lists.
#[derive(Debug, Default, Clone)]
pub struct MappingBuilder {
    mapping: DependencyMapping,
}

impl MappingBuilder {
    pub fn new() -> Self {
        MappingBuilder::default()
    }

    /// Places `asset` inside `bundle` at `offset`.
    pub fn asset(mut self, asset: AssetId, bundle: BundleId, offset: u64) -> Self {
        self.mapping.assets.insert(asset, bundle);
        self.mapping.offsets.insert(asset, offset);
        self
    }

    /// Declares `bundle` with its ordered dependency list.
    pub fn bundle<T>(mut self, bundle: BundleId, dependencies: T) -> Self
    where
        T: IntoIterator<Item = BundleId>,
    {
        self.mapping
            .dependencies
            .insert(bundle, dependencies.into_iter().collect());
        self
    }

    pub fn build(self) -> DependencyMapping {
        let mut mapping = self.mapping;
        let mut dependants: HashMap<BundleId, Vec<BundleId>> = HashMap::new();

        let mut bundles: Vec<_> = mapping.dependencies.keys().cloned().collect();
        bundles.sort();

        for bundle in bundles {
            for &dependency in &mapping.dependencies[&bundle] {
                if dependency.is_sentinel() {
                    continue;
                }

                let v = dependants.entry(dependency).or_insert_with(Vec::new);
                if !v.contains(&bundle) {
                    v.push(bundle);
                }
            }
        }

        mapping.dependants = dependants;
        mapping
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;

    fn bundle(n: u128) -> BundleId {
        BundleId::new(Uuid::from_u128(n))
    }

    #[test]
    fn derive_dependants() {
        let a = bundle(1);
        let b = bundle(2);
        let c = bundle(3);

        let mapping = MappingBuilder::new()
            .bundle(a, vec![b, BundleId::sentinel(), c])
            .bundle(b, vec![c])
            .bundle(c, vec![BundleId::sentinel()])
            .build();

        assert_eq!(mapping.dependencies(a), &[b, BundleId::sentinel(), c]);
        assert_eq!(mapping.dependants(c), &[a, b]);
        assert_eq!(mapping.dependants(b), &[a]);
        assert!(mapping.dependants(a).is_empty());
        assert!(mapping.dependants(BundleId::sentinel()).is_empty());
    }

    #[test]
    fn resolve() {
        let asset = AssetId::new(Uuid::from_u128(9), 5);
        let mapping = MappingBuilder::new()
            .bundle(bundle(1), vec![])
            .asset(asset, bundle(1), 128)
            .build();

        assert_eq!(mapping.resolve(asset), Some(bundle(1)));
        assert_eq!(mapping.local_offset(asset), Some(128));
        assert_eq!(mapping.resolve(AssetId::new(Uuid::from_u128(9), 6)), None);
        assert!(mapping.dependencies(bundle(42)).is_empty());
    }
}
