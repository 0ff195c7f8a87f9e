//! Per-mountpath worker: owns one `AtimeMap`, serializes all access to it, performs batched
//! writebacks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use nix::sys::stat::UtimensatFlags;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{AtimeCacheConfig, MaxMapSize};
use crate::flush::{compute_flush_count, Utilization};
use crate::message::{ReplyChannel, Response};
use crate::oracle::UtilizationOracle;
use crate::record::AtimeMap;
use crate::registry::{FilesystemId, MountpathId};
use crate::time::{system_time_from_stat, system_time_to_timespec};

/// A handle to a spawned [`Worker`] task, owned exclusively by the
/// [`Dispatcher`](crate::dispatcher::Dispatcher).
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    set_tx: mpsc::Sender<(PathBuf, SystemTime)>,
    get_tx: mpsc::Sender<(PathBuf, ReplyChannel)>,
    flush_tx: mpsc::Sender<usize>,
    stop_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Forwards a Touch request. Suspends the caller (the Dispatcher) if the set channel
    /// (capacity [`AtimeCacheConfig::set_channel_capacity`]) is full — the back-pressure point
    /// described in §5.
    pub(crate) async fn touch(&self, path: PathBuf, time: SystemTime) {
        let _ = self.set_tx.send((path, time)).await;
    }

    /// Forwards a Query request. The get channel has capacity one, approximating the spec's
    /// unbuffered get channel.
    pub(crate) async fn query(&self, path: PathBuf, reply: ReplyChannel) {
        let _ = self.get_tx.send((path, reply)).await;
    }

    /// Forwards a flush signal. `n = 0` asks the worker to compute its own flush size.
    pub(crate) async fn flush(&self, n: usize) {
        let _ = self.flush_tx.send(n).await;
    }

    /// Signals the worker to stop and waits for its task to exit. A flush already in progress
    /// runs to completion first (§5: "Workers do not cancel in-flight syscalls").
    pub(crate) async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let _ = self.join.await;
    }
}

struct Worker {
    filesystem: FilesystemId,
    map: AtimeMap,
    max_map_size: MaxMapSize,
    oracle: Arc<dyn UtilizationOracle>,
    set_rx: mpsc::Receiver<(PathBuf, SystemTime)>,
    get_rx: mpsc::Receiver<(PathBuf, ReplyChannel)>,
    flush_rx: mpsc::Receiver<usize>,
    stop_rx: oneshot::Receiver<()>,
}

/// Spawns a new per-mountpath worker task and returns a handle to it.
pub(crate) fn spawn(
    mountpath: &MountpathId,
    filesystem: FilesystemId,
    oracle: Arc<dyn UtilizationOracle>,
    config: &AtimeCacheConfig,
) -> WorkerHandle {
    let (set_tx, set_rx) = mpsc::channel(config.set_channel_capacity);
    let (get_tx, get_rx) = mpsc::channel(1);
    let (flush_tx, flush_rx) = mpsc::channel(1);
    let (stop_tx, stop_rx) = oneshot::channel();

    let worker = Worker {
        filesystem,
        map: AtimeMap::new(),
        max_map_size: config.max_map_size.clone(),
        oracle,
        set_rx,
        get_rx,
        flush_rx,
        stop_rx,
    };

    let mountpath = mountpath.clone();
    let join = tokio::spawn(async move {
        log::debug!("worker for mountpath {mountpath} starting");
        worker.run().await;
        log::debug!("worker for mountpath {mountpath} stopped");
    });

    WorkerHandle {
        set_tx,
        get_tx,
        flush_tx,
        stop_tx: Some(stop_tx),
        join,
    }
}

impl Worker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                maybe_set = self.set_rx.recv() => {
                    match maybe_set {
                        Some((path, time)) => self.map.touch(path, time),
                        None => break,
                    }
                }
                maybe_get = self.get_rx.recv() => {
                    match maybe_get {
                        Some((path, reply)) => {
                            let response = match self.map.get(&path) {
                                Some(time) => Response::found(time),
                                None => Response::ABSENT,
                            };
                            let _ = reply.send(response);
                        }
                        None => break,
                    }
                }
                maybe_flush = self.flush_rx.recv() => {
                    match maybe_flush {
                        Some(n) => self.handle_flush(n),
                        None => break,
                    }
                }
                _ = &mut self.stop_rx => break,
            }
        }
    }

    /// `n = 0` means "compute the count yourself using the utilization policy" (§4.2).
    fn handle_flush(&mut self, n: usize) {
        let n = if n == 0 {
            let utilization = match self.oracle.max_util(&self.filesystem) {
                Some(percent) => Utilization::Percent(percent),
                None => Utilization::Unavailable,
            };
            compute_flush_count(self.map.len(), self.max_map_size.get(), utilization)
        } else {
            n
        };

        if n == 0 || self.map.is_empty() {
            return;
        }

        // `block_in_place` panics off a current-thread runtime, so only reach for it when the
        // isolation it buys (only this worker's task stalls; other mountpaths' workers run on
        // other OS threads) is actually available. On a current-thread runtime there is only one
        // OS thread regardless, so running inline costs nothing extra over the panic it'd
        // otherwise be.
        if tokio::runtime::Handle::current().runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread
        {
            tokio::task::block_in_place(|| self.writeback(n));
        } else {
            self.writeback(n);
        }
    }

    fn writeback(&mut self, n: usize) {
        let candidates = self.map.sample(n);
        let mut completed = 0usize;

        for (path, atime) in candidates {
            if completed >= n {
                break;
            }
            completed += self.writeback_one(&path, atime);
        }
    }

    /// Returns 1 if the entry was resolved (removed from the map, successfully or because the
    /// file is gone), 0 if it should be retried on a later flush.
    fn writeback_one(&mut self, path: &Path, atime: SystemTime) -> usize {
        let stat = match nix::sys::stat::stat(path) {
            Ok(stat) => stat,
            Err(nix::Error::ENOENT) => {
                self.map.remove(path);
                return 1;
            }
            Err(e) => {
                log::warn!("stat({}) failed, will retry: {e}", path.display());
                return 0;
            }
        };

        let mtime = system_time_from_stat(stat.st_mtime, stat.st_mtime_nsec);
        let atime_spec = system_time_to_timespec(&atime);
        let mtime_spec = system_time_to_timespec(&mtime);

        match nix::sys::stat::utimensat(
            None,
            path,
            &atime_spec,
            &mtime_spec,
            UtimensatFlags::NoFollowSymlink,
        ) {
            Ok(()) => {
                self.map.remove(path);
                1
            }
            Err(nix::Error::ENOENT) => {
                self.map.remove(path);
                1
            }
            Err(e) => {
                log::warn!("set_file_times({}) failed, will retry: {e}", path.display());
                0
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn new_worker() -> Worker {
        let (_set_tx, set_rx) = mpsc::channel(1);
        let (_get_tx, get_rx) = mpsc::channel(1);
        let (_flush_tx, flush_rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = oneshot::channel();
        Worker {
            filesystem: FilesystemId::new("fs-test"),
            map: AtimeMap::new(),
            max_map_size: MaxMapSize::new(1_000_000),
            oracle: Arc::new(NoReading),
            set_rx,
            get_rx,
            flush_rx,
            stop_rx,
        }
    }

    struct NoReading;
    impl UtilizationOracle for NoReading {
        fn max_util(&self, _filesystem: &FilesystemId) -> Option<u8> {
            None
        }
    }

    #[test]
    fn writeback_one_sets_atime_and_preserves_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj");
        fs::write(&path, b"data").unwrap();
        let before = fs::metadata(&path).unwrap();
        let before_mtime = before.modified().unwrap();

        let mut worker = new_worker();
        let requested_atime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let resolved = worker.writeback_one(&path, requested_atime);
        assert_eq!(resolved, 1);

        let stat = nix::sys::stat::stat(&path).unwrap();
        let new_atime = system_time_from_stat(stat.st_atime, stat.st_atime_nsec);
        let new_mtime = system_time_from_stat(stat.st_mtime, stat.st_mtime_nsec);
        assert_eq!(new_atime, requested_atime);
        assert_eq!(new_mtime, before_mtime);
    }

    #[test]
    fn writeback_one_on_missing_file_is_resolved_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone");

        let mut worker = new_worker();
        let resolved = worker.writeback_one(&path, SystemTime::now());
        assert_eq!(resolved, 1);
    }

    #[test]
    fn writeback_drains_up_to_n_entries_and_removes_them() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = new_worker();
        let mut paths = Vec::new();
        for i in 0..5 {
            let path = dir.path().join(format!("obj-{i}"));
            fs::write(&path, b"data").unwrap();
            worker.map.touch(path.clone(), SystemTime::now());
            paths.push(path);
        }

        worker.writeback(3);
        assert_eq!(worker.map.len(), 2);
    }

    #[test]
    fn handle_flush_skips_below_threshold_map() {
        let mut worker = new_worker();
        worker
            .map
            .touch(PathBuf::from("/mnt/a/obj"), SystemTime::now());
        // Below FLUSH_THRESHOLD with n = 0: compute_flush_count yields 0, nothing happens.
        worker.handle_flush(0);
        assert_eq!(worker.map.len(), 1);
    }

    #[test]
    fn handle_flush_with_empty_map_is_a_no_op() {
        let mut worker = new_worker();
        worker.handle_flush(10);
        assert!(worker.map.is_empty());
    }
}
