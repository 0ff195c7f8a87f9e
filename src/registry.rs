//! The mountpath registry collaborator contract (external to this subsystem; §6).

use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Stable identifier for a mounted filesystem, used as the key for utilization queries.
///
/// A thin newtype rather than a bare `String` so routing keys cannot be confused with object
/// paths at the type level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilesystemId(Arc<str>);

impl FilesystemId {
    /// Wraps a raw filesystem identifier.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Borrows the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilesystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one mounted filesystem's root directory, the routing key the Dispatcher keys its
/// worker registry by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountpathId(Arc<str>);

impl MountpathId {
    /// Wraps a raw mountpath.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Borrows the mountpath as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MountpathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What `resolve()` reports for a path that does fall under a known, active mountpath.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountpathInfo {
    /// The mountpath this object path resolves under.
    pub mountpath: MountpathId,
    /// The filesystem backing that mountpath, used for utilization lookups.
    pub filesystem: FilesystemId,
}

/// A mountpath add/remove/enable/disable notification.
///
/// Enable/Disable are accepted but produce no action in this subsystem (§4.1); they exist so the
/// Dispatcher's event loop has one variant type to match on regardless of which the registry
/// emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MountpathEvent {
    /// A filesystem was mounted and should gain a worker.
    Add(MountpathInfo),
    /// A filesystem was unmounted and its worker should be stopped.
    Remove(MountpathId),
    /// Accepted, no-op in this subsystem.
    Enable(MountpathId),
    /// Accepted, no-op in this subsystem.
    Disable(MountpathId),
}

/// The mountpath registry interface the core consumes (§4.4, §6).
///
/// Implemented by an external component that enumerates filesystems and resolves object paths to
/// the mountpath that owns them; this subsystem never mutates registry state, only reads it.
pub trait MountpathRegistry: Send + Sync {
    /// Resolves an object path to the mountpath and filesystem that own it, or `None` if no
    /// active mountpath is a prefix of `path`.
    fn resolve(&self, path: &Path) -> Option<MountpathInfo>;

    /// Lists the currently available and currently disabled mountpaths.
    fn enumerate(&self) -> (Vec<MountpathInfo>, Vec<MountpathInfo>);

    /// Drains any mountpath lifecycle events observed since the last call.
    ///
    /// The Dispatcher polls this alongside its flush ticker and applies the drained events in
    /// order (§6's "asynchronous event stream"). A registry with no proactive notification of
    /// its own, driven entirely through `DispatcherHandle::request_add_mountpath` /
    /// `request_remove_mountpath`, can rely on the default empty drain.
    fn poll_events(&self) -> Vec<MountpathEvent> {
        Vec::new()
    }
}
