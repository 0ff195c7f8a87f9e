//! Request/response types exchanged across the Dispatcher → Worker boundary.

use std::path::PathBuf;
use std::time::SystemTime;

use tokio::sync::oneshot;

use crate::registry::MountpathId;

/// The result of an `Atime` query.
///
/// `present = false` implies `time` is [`SystemTime::UNIX_EPOCH`] (the "zero instant").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Whether the object had a cached access time.
    pub present: bool,
    /// The cached access time, or the zero instant if `present` is `false`.
    pub time: SystemTime,
}

impl Response {
    pub(crate) const ABSENT: Response = Response {
        present: false,
        time: SystemTime::UNIX_EPOCH,
    };

    pub(crate) fn found(time: SystemTime) -> Self {
        Self {
            present: true,
            time,
        }
    }
}

/// A one-shot reply channel for a single `Atime` query.
pub type ReplyChannel = oneshot::Sender<Response>;

/// An inbound client request, already resolved to a mountpath.
///
/// This is the public ingress the Dispatcher's request channel carries (§4.1's "single request
/// ingress"); `mountpath` is filled in by the caller-facing `touch_*`/`atime*` entry points after
/// consulting the registry, never guessed at by the Dispatcher.
#[derive(Debug)]
pub(crate) enum Inbound {
    Touch {
        mountpath: MountpathId,
        path: PathBuf,
        time: SystemTime,
    },
    Query {
        mountpath: MountpathId,
        path: PathBuf,
        reply: ReplyChannel,
    },
}

/// A mountpath lifecycle or runtime-control request fed to the Dispatcher (§9's
/// "duck-typed runner/pathrunner interfaces reduce to a capability set").
#[derive(Debug)]
pub(crate) enum Control {
    AddMountpath(crate::registry::MountpathInfo),
    RemoveMountpath(MountpathId),
    Stop,
}
