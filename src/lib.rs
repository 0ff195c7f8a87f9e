//! Access-time tracking for a storage target mounted `noatime`.
//!
//! On a filesystem mounted with `noatime`, the kernel never updates a file's access time on
//! read, which breaks an LRU eviction policy that depends on it. This crate maintains its own
//! in-memory record of object access times, one `AtimeMap` per mountpath, and periodically
//! writes them back with `utimensat` — throttled by a disk-utilization reading so writeback
//! traffic never competes with the data path on a busy disk.
//!
//! The [`Dispatcher`] is the single entry point: it owns one per-mountpath worker task for each
//! mounted filesystem and routes every `touch`/`atime` call to the right one via
//! [`DispatcherHandle`]. Workers never share state; each owns its mapping exclusively and talks
//! to the Dispatcher only over channels.
//!
//! This crate does not decide *when* files are evicted (that is the LRU evictor's job) and does
//! not persist anything across a process restart: losing the last flush interval of access times
//! on crash is an acceptable approximation for LRU.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub use crate::config::{AtimeCacheConfig, MaxMapSize};
pub use crate::dispatcher::{Dispatcher, DispatcherHandle};
pub use crate::message::{ReplyChannel, Response};
pub use crate::oracle::UtilizationOracle;
pub use crate::registry::{
    FilesystemId, MountpathEvent, MountpathId, MountpathInfo, MountpathRegistry,
};

mod config;
mod dispatcher;
mod flush;
mod message;
mod oracle;
mod record;
mod registry;
mod time;
mod worker;
