//! Commonly used utilities like handles, pools and bit-sets.

#[macro_use]
pub mod handle;
pub mod bitmask;
pub mod handle_pool;
pub mod latch;
pub mod object_pool;

pub mod prelude {
    pub use super::bitmask::Bitmask;
    pub use super::handle::{Handle, HandleIndex, HandleLike};
    pub use super::handle_pool::HandlePool;
    pub use super::latch::Latch;
    pub use super::object_pool::ObjectPool;
}
