use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a single asset: the GUID of its source file plus the local
/// identifier of the object inside that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId {
    pub guid: Uuid,
    pub local: i64,
}

impl AssetId {
    #[inline]
    pub fn new(guid: Uuid, local: i64) -> Self {
        AssetId { guid, local }
    }

    /// An identifier with a nil GUID or a zero local id refers to nothing.
    #[inline]
    pub fn is_set(&self) -> bool {
        !self.guid.is_nil() && self.local != 0
    }
}

impl Default for AssetId {
    fn default() -> Self {
        AssetId::new(Uuid::nil(), 0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{}]", self.guid.to_simple(), self.local)
    }
}

/// Identifies a content bundle. The nil id is reserved as the sentinel for the
/// implicit global dependency every bundle may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BundleId(pub Uuid);

impl BundleId {
    #[inline]
    pub fn new(uuid: Uuid) -> Self {
        BundleId(uuid)
    }

    #[inline]
    pub fn sentinel() -> Self {
        BundleId(Uuid::nil())
    }

    #[inline]
    pub fn is_sentinel(self) -> bool {
        self.0.is_nil()
    }

    /// The file name of this bundle inside the archives folder, and of its
    /// content file inside the mounted archive.
    #[inline]
    pub fn file_name(self) -> String {
        self.0.to_simple().to_string()
    }
}

impl Default for BundleId {
    fn default() -> Self {
        BundleId::sentinel()
    }
}

impl From<Uuid> for BundleId {
    fn from(uuid: Uuid) -> Self {
        BundleId(uuid)
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.to_simple())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sentinel() {
        assert!(BundleId::sentinel().is_sentinel());
        assert!(BundleId::default().is_sentinel());
        assert!(!BundleId::new(Uuid::from_u128(7)).is_sentinel());
    }

    #[test]
    fn names() {
        let bundle = BundleId::new(Uuid::from_u128(0xab));
        assert_eq!(bundle.file_name(), "000000000000000000000000000000ab");
        assert_eq!(format!("{}", bundle), bundle.file_name());

        let asset = AssetId::new(Uuid::from_u128(1), 42);
        assert!(asset.is_set());
        assert!(!AssetId::default().is_set());
        assert_eq!(format!("{}", asset), "00000000000000000000000000000001[42]");
    }
}
