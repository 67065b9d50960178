use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;

pub type HandleIndex = u32;

/// A `Handle` names a slot in some pool with an `index`, and the lifetime of
/// the value stored in that slot with a `version`. Slots are recycled, so two
/// handles may share an index; the version tells them apart.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    index: HandleIndex,
    version: HandleIndex,
}

impl Handle {
    #[inline]
    pub fn new(index: HandleIndex, version: HandleIndex) -> Self {
        Handle { index, version }
    }

    /// The nil handle. No pool ever hands it out.
    #[inline]
    pub fn nil() -> Self {
        Handle::default()
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Handle::nil()
    }

    #[inline]
    pub fn index(self) -> HandleIndex {
        self.index
    }

    #[inline]
    pub fn version(self) -> HandleIndex {
        self.version
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.index, self.version)
    }
}

/// Anything that wraps a raw `Handle` can be stored in the pools.
pub trait HandleLike: Debug + Copy + Hash + Eq {
    fn from_raw(handle: Handle) -> Self;
    fn raw(self) -> Handle;

    #[inline]
    fn new(index: HandleIndex, version: HandleIndex) -> Self {
        Self::from_raw(Handle::new(index, version))
    }

    #[inline]
    fn index(&self) -> HandleIndex {
        self.raw().index
    }

    #[inline]
    fn version(&self) -> HandleIndex {
        self.raw().version
    }
}

impl HandleLike for Handle {
    #[inline]
    fn from_raw(handle: Handle) -> Self {
        handle
    }

    #[inline]
    fn raw(self) -> Handle {
        self
    }
}

/// Declares a newtype around `Handle`, so an archive handle can never be
/// passed where a content handle is expected.
#[macro_export]
macro_rules! impl_handle {
    ($name:ident) => {
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::utils::handle::Handle);

        impl $name {
            #[inline]
            pub fn nil() -> Self {
                $name($crate::utils::handle::Handle::nil())
            }

            #[inline]
            pub fn is_valid(self) -> bool {
                self.0.is_valid()
            }
        }

        impl $crate::utils::handle::HandleLike for $name {
            #[inline]
            fn from_raw(handle: $crate::utils::handle::Handle) -> Self {
                $name(handle)
            }

            #[inline]
            fn raw(self) -> $crate::utils::handle::Handle {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}{}", stringify!($name), self.0)
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    impl_handle!(ArchiveLikeHandle);

    #[test]
    fn newtype() {
        let h1 = ArchiveLikeHandle::default();
        assert_eq!(h1, ArchiveLikeHandle::nil());
        assert!(!h1.is_valid());

        let h2 = ArchiveLikeHandle::new(0, 1);
        assert!(h2.is_valid());
        assert_eq!(h2.raw(), Handle::new(0, 1));
        assert_eq!((h2.index(), h2.version()), (0, 1));
        assert_eq!(format!("{}", h2), "ArchiveLikeHandle(0, 1)");
    }
}
