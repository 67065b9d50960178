//! # What is This?
//!
//! Streams packaged content bundles in and out of memory on behalf of a host
//! application. Bundles form a dependency graph: a bundle can only be decoded
//! once everything it depends on is resident, and must stay resident while
//! anything depending on it is alive.
//!
//! # Bundle
//!
//! A bundle is an archive holding one content file, built offline together
//! with a `DependencyMapping` that tells which bundle holds an asset and which
//! bundles it needs. Mounting the archive, decoding the content file and
//! releasing it again are asynchronous operations performed by an
//! `AssetProvider`. None of them can be cancelled once issued.
//!
//! # Lifecycle
//!
//! Each requested bundle is reference counted and walks through
//! mount, dependency wait, decode and back through unload and unmount. The
//! `BundleSystem` advances every bundle once per host frame, bounded by
//! per-phase concurrency caps and biased by request priority.
//!
//! ```rust,ignore
//! let mut bundles = BundleSystem::from_directory(BundleParams::load("bundles.json")?)?;
//! let handle = bundles.load_async(asset, |_, result| println!("{:?}", result), Delivery::Immediate, Priority::NORMAL)?;
//!
//! loop {
//!     bundles.advance();
//! }
//! ```
//!
//! # Handle
//!
//! Requests are named with versioned `LoadTaskHandle`s. Cancelling a request
//! bumps the version of its slot, so any stale copy fails closed as `Invalid`
//! even after the slot has been reused.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

#[macro_use]
pub mod utils;
pub mod errors;
pub mod lifecycle;
pub mod mapping;
pub mod params;
pub mod provider;
pub mod system;
pub mod tasks;

pub mod prelude;
