//! Dispatcher: single entry point, routes requests to per-mountpath workers, manages worker
//! lifecycle, drives periodic flushes (§4.1).

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::AtimeCacheConfig;
use crate::message::{Control, Inbound, ReplyChannel, Response};
use crate::oracle::UtilizationOracle;
use crate::registry::{MountpathEvent, MountpathId, MountpathInfo, MountpathRegistry};
use crate::worker::{self, WorkerHandle};

/// Client-facing handle to a running [`Dispatcher`]. Cheap to clone; every clone shares the same
/// request ingress and control plane.
#[derive(Clone)]
pub struct DispatcherHandle {
    request_tx: mpsc::Sender<Inbound>,
    control_tx: mpsc::UnboundedSender<Control>,
    registry: Arc<dyn MountpathRegistry>,
}

impl DispatcherHandle {
    /// Touch `path` with the current wall-clock time. Silently dropped if `path` does not
    /// resolve to a known mountpath.
    pub async fn touch_now(&self, path: impl Into<PathBuf>) {
        self.touch_at(path, SystemTime::now()).await;
    }

    /// Touch `path` with an explicit access time. Silently dropped if `path` does not resolve to
    /// a known mountpath.
    pub async fn touch_at(&self, path: impl Into<PathBuf>, time: SystemTime) {
        let path = path.into();
        if let Some(info) = self.registry.resolve(&path) {
            let inbound = Inbound::Touch {
                mountpath: info.mountpath,
                path,
                time,
            };
            // Suspends here under back-pressure: the admission-control point of §5.
            let _ = self.request_tx.send(inbound).await;
        }
    }

    /// Queries `path`'s cached access time using a freshly allocated, single-use reply channel.
    pub async fn atime_new_reply(&self, path: impl Into<PathBuf>) -> oneshot::Receiver<Response> {
        let (reply, rx) = oneshot::channel();
        self.atime_into_reply(path, reply).await;
        rx
    }

    /// Queries `path`'s cached access time, delivering the single reply on a caller-supplied
    /// channel.
    pub async fn atime_into_reply(&self, path: impl Into<PathBuf>, reply: ReplyChannel) {
        let path = path.into();
        match self.registry.resolve(&path) {
            None => {
                let _ = reply.send(Response::ABSENT);
            }
            Some(info) => {
                let inbound = Inbound::Query {
                    mountpath: info.mountpath,
                    path,
                    reply,
                };
                let _ = self.request_tx.send(inbound).await;
            }
        }
    }

    /// Requests that a worker be spawned for a newly mounted filesystem. Processed asynchronously
    /// by the Dispatcher; duplicate requests are logged and otherwise ignored.
    pub fn request_add_mountpath(&self, info: MountpathInfo) {
        let _ = self.control_tx.send(Control::AddMountpath(info));
    }

    /// Requests that the worker for a removed filesystem be stopped. Processed asynchronously;
    /// requests for an unknown mountpath are logged and otherwise ignored.
    pub fn request_remove_mountpath(&self, mountpath: MountpathId) {
        let _ = self.control_tx.send(Control::RemoveMountpath(mountpath));
    }

    /// Requests that the Dispatcher stop. Pending cached atimes are not flushed — see §4.1.
    pub fn stop(&self) {
        let _ = self.control_tx.send(Control::Stop);
    }
}

/// Owns the worker registry, the request/control ingress, and the flush ticker. Exactly one
/// Dispatcher per process (§3).
pub struct Dispatcher {
    workers: HashMap<MountpathId, WorkerHandle>,
    registry: Arc<dyn MountpathRegistry>,
    oracle: Arc<dyn UtilizationOracle>,
    config: AtimeCacheConfig,
    request_rx: mpsc::Receiver<Inbound>,
    control_rx: mpsc::UnboundedReceiver<Control>,
}

impl Dispatcher {
    /// Builds a new Dispatcher and its client-facing handle. Fails if `config` does not validate.
    pub fn new(
        registry: Arc<dyn MountpathRegistry>,
        oracle: Arc<dyn UtilizationOracle>,
        config: AtimeCacheConfig,
    ) -> io::Result<(Self, DispatcherHandle)> {
        config.validate()?;

        // Unbuffered request ingress: capacity one is the closest bounded-channel approximation
        // of a rendezvous channel.
        let (request_tx, request_rx) = mpsc::channel(1);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let handle = DispatcherHandle {
            request_tx,
            control_tx,
            registry: registry.clone(),
        };
        let dispatcher = Self {
            workers: HashMap::new(),
            registry,
            oracle,
            config,
            request_rx,
            control_rx,
        };
        Ok((dispatcher, handle))
    }

    /// Builds a Dispatcher, spawns it as its own task, and returns the client handle plus a
    /// join handle for the spawned task.
    ///
    /// Runs correctly on any runtime flavor. On a multi-threaded runtime, a worker's writeback
    /// syscalls stall only that worker's own task while flushing; on a current-thread runtime
    /// there is only one OS thread to begin with, so a flush briefly blocks the whole runtime
    /// regardless of which worker triggered it.
    pub fn spawn(
        registry: Arc<dyn MountpathRegistry>,
        oracle: Arc<dyn UtilizationOracle>,
        config: AtimeCacheConfig,
    ) -> io::Result<(DispatcherHandle, JoinHandle<()>)> {
        let (dispatcher, handle) = Self::new(registry, oracle, config)?;
        let join = tokio::spawn(dispatcher.run());
        Ok((handle, join))
    }

    /// Seeds the worker registry from the mountpath registry's current snapshot. Disabled
    /// mountpaths are enumerated but do not get a worker (§4.1: Enable/Disable are no-ops here).
    pub fn prime_from_registry(&mut self) {
        let (available, _disabled) = self.registry.enumerate();
        for info in available {
            self.add_worker(info);
        }
    }

    /// Runs the main select loop until a stop request arrives or both ingress channels close.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.flush_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so the first real flush happens after a
        // full period, matching "periodic" rather than "on startup".
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.drain_registry_events().await;
                    self.flush_all().await;
                }
                maybe = self.request_rx.recv() => {
                    match maybe {
                        Some(inbound) => self.handle_inbound(inbound).await,
                        None => break,
                    }
                }
                maybe = self.control_rx.recv() => {
                    match maybe {
                        Some(Control::Stop) => break,
                        Some(Control::AddMountpath(info)) => self.add_worker(info),
                        Some(Control::RemoveMountpath(mountpath)) => self.remove_worker(mountpath).await,
                        None => break,
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Touch {
                mountpath,
                path,
                time,
            } => {
                if let Some(handle) = self.workers.get(&mountpath) {
                    handle.touch(path, time).await;
                }
                // Unknown here despite a successful resolve means the mountpath was removed
                // between resolution and dispatch; dropping the touch matches §7's unknown
                // mountpath policy.
            }
            Inbound::Query {
                mountpath,
                path,
                reply,
            } => match self.workers.get(&mountpath) {
                Some(handle) => handle.query(path, reply).await,
                None => {
                    let _ = reply.send(Response::ABSENT);
                }
            },
        }
    }

    /// Drains the registry's event stream and applies each event in order. Enable/Disable carry
    /// no action in this subsystem (§4.1).
    async fn drain_registry_events(&mut self) {
        for event in self.registry.poll_events() {
            match event {
                MountpathEvent::Add(info) => self.add_worker(info),
                MountpathEvent::Remove(mountpath) => match self.workers.remove(&mountpath) {
                    Some(handle) => handle.stop().await,
                    // A remove from the event stream racing an already-absent worker is routine
                    // (the stream and explicit requests can observe the same unmount), unlike the
                    // explicit `request_remove_mountpath` case, so it's logged at debug, not error.
                    None => log::debug!("registry reported remove for unknown mountpath: {mountpath}"),
                },
                MountpathEvent::Enable(_) | MountpathEvent::Disable(_) => {}
            }
        }
    }

    fn add_worker(&mut self, info: MountpathInfo) {
        if self.workers.contains_key(&info.mountpath) {
            log::warn!("duplicate mountpath add for {}, keeping existing worker", info.mountpath);
            return;
        }
        let handle = worker::spawn(&info.mountpath, info.filesystem, self.oracle.clone(), &self.config);
        self.workers.insert(info.mountpath, handle);
    }

    async fn remove_worker(&mut self, mountpath: MountpathId) {
        match self.workers.remove(&mountpath) {
            Some(handle) => handle.stop().await,
            None => log::error!("unknown mountpath on remove: {mountpath}"),
        }
    }

    async fn flush_all(&mut self) {
        for handle in self.workers.values() {
            handle.flush(0).await;
        }
    }

    async fn shutdown(mut self) {
        for (_, handle) in self.workers.drain() {
            handle.stop().await;
        }
    }
}
