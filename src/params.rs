//! Functions for loading bundle system settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::lifecycle::Limits;
use crate::mapping::BundleId;

/// Name of the folder under `base_dir` holding one archive per bundle.
pub const ARCHIVES_FOLDER: &str = "Archives";
/// Name of the dependency mapping file under `base_dir`.
pub const MAPPING_FILE: &str = "BundleMapping.bin";

/// A structure containing configuration data for the bundle system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleParams {
    /// Loads the dependency mapping from `base_dir`. Without it the system
    /// starts with an empty mapping and nothing is loadable.
    pub use_build_data: bool,
    /// Root folder of the built data.
    pub base_dir: PathBuf,
    /// Content namespace passed to every provider call.
    pub namespace: String,
    pub limits: Limits,
    /// Initial number of loading task slots. Doubles when exhausted.
    pub initial_task_capacity: usize,
    /// Number of worker threads used by `DirectoryProvider`.
    pub workers: usize,
}

impl Default for BundleParams {
    fn default() -> Self {
        BundleParams {
            use_build_data: true,
            base_dir: PathBuf::from("bundles"),
            namespace: "bundles".to_owned(),
            limits: Limits::default(),
            initial_task_capacity: 256,
            workers: 2,
        }
    }
}

impl BundleParams {
    /// Reads settings from the JSON file at `path`. A missing file yields the
    /// defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Bundle settings {:?} not found, using defaults.", path);
            return Ok(BundleParams::default());
        }

        let bytes = fs::read(path)?;
        let params = serde_json::from_slice(&bytes)?;
        Ok(params)
    }

    #[inline]
    pub fn archives_dir(&self) -> PathBuf {
        self.base_dir.join(ARCHIVES_FOLDER)
    }

    #[inline]
    pub fn mapping_file(&self) -> PathBuf {
        self.base_dir.join(MAPPING_FILE)
    }

    /// Path of the archive holding `bundle`.
    #[inline]
    pub fn archive_file(&self, bundle: BundleId) -> PathBuf {
        self.archives_dir().join(bundle.file_name())
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn paths() {
        let mut params = BundleParams::default();
        params.base_dir = PathBuf::from("data");

        let bundle = BundleId::new(Uuid::from_u128(0x10));
        assert_eq!(params.archives_dir(), Path::new("data/Archives"));
        assert_eq!(params.mapping_file(), Path::new("data/BundleMapping.bin"));
        assert_eq!(
            params.archive_file(bundle),
            Path::new("data/Archives/00000000000000000000000000000010")
        );
    }

    #[test]
    fn partial_json() {
        let params: BundleParams =
            serde_json::from_str(r#"{ "use_build_data": false, "limits": { "mounts": 3 } }"#)
                .unwrap();

        assert!(!params.use_build_data);
        assert_eq!(params.limits.mounts, 3);
        assert_eq!(params.limits.content_loads, 10);
        assert_eq!(params.initial_task_capacity, 256);
    }

    #[test]
    fn missing_file() {
        let params = BundleParams::load("this/file/does/not/exist.json").unwrap();
        assert_eq!(params, BundleParams::default());
    }
}
