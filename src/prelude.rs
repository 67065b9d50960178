pub use crate::errors::{Error, Result};
pub use crate::lifecycle::{BundleInfo, BundleState, Limits, Ongoing, Priority};
pub use crate::mapping::{AssetId, BundleId, DependencyMapping, MappingBuilder};
pub use crate::params::BundleParams;
pub use crate::provider::disk::DirectoryProvider;
pub use crate::provider::headless::HeadlessProvider;
pub use crate::provider::{AssetProvider, ContentHandle, OpStatus};
pub use crate::system::BundleSystem;
pub use crate::tasks::{Delivery, LoadResult, LoadResultState, LoadTaskHandle, LoadedContent};
