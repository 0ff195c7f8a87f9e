//! The in-memory access-time mapping owned by a single [`Worker`](crate::worker::Worker).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// A single object's most recently observed access time.
///
/// Uniqueness of the path within the owning [`AtimeMap`] is maintained by the map itself; this
/// type carries no identity beyond the tuple it wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    pub(crate) atime: SystemTime,
}

impl AccessRecord {
    fn new(atime: SystemTime) -> Self {
        Self { atime }
    }
}

/// Path → access-time mapping for one mountpath.
///
/// Owned exclusively by its [`Worker`](crate::worker::Worker); never shared or locked. Size is
/// soft-bounded by `MaxMapSize` (see [`crate::config::AtimeCacheConfig`]) but may transiently grow
/// past it between flushes.
#[derive(Debug, Default)]
pub(crate) struct AtimeMap {
    entries: HashMap<PathBuf, AccessRecord>,
}

impl AtimeMap {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Last-writer-wins insert/overwrite of a single path's access time.
    pub(crate) fn touch(&mut self, path: PathBuf, atime: SystemTime) {
        self.entries.insert(path, AccessRecord::new(atime));
    }

    pub(crate) fn get(&self, path: &std::path::Path) -> Option<SystemTime> {
        self.entries.get(path).map(|record| record.atime)
    }

    pub(crate) fn remove(&mut self, path: &std::path::Path) {
        self.entries.remove(path);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Takes up to `n` `(path, atime)` pairs out of the map in unspecified order.
    ///
    /// The entries are not removed here: the writeback procedure decides, per entry, whether a
    /// retry is warranted (see [`crate::worker::Worker::writeback`]).
    pub(crate) fn sample(&self, n: usize) -> Vec<(PathBuf, SystemTime)> {
        self.entries
            .iter()
            .take(n)
            .map(|(path, record)| (path.clone(), record.atime))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn touch_overwrites_last_writer_wins() {
        let mut map = AtimeMap::new();
        let path = PathBuf::from("/mnt/a/obj");
        map.touch(path.clone(), SystemTime::UNIX_EPOCH);
        map.touch(path.clone(), SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(5));
        assert_eq!(
            map.get(&path),
            Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(5))
        );
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn missing_key_yields_none() {
        let map = AtimeMap::new();
        assert_eq!(map.get(std::path::Path::new("/nope")), None);
    }

    #[test]
    fn remove_drops_entry() {
        let mut map = AtimeMap::new();
        let path = PathBuf::from("/mnt/a/obj");
        map.touch(path.clone(), SystemTime::now());
        map.remove(&path);
        assert!(map.is_empty());
    }

    #[test]
    fn sample_never_exceeds_requested_count() {
        let mut map = AtimeMap::new();
        for i in 0..10 {
            map.touch(PathBuf::from(format!("/mnt/a/{i}")), SystemTime::now());
        }
        assert_eq!(map.sample(3).len(), 3);
        assert_eq!(map.sample(100).len(), 10);
    }
}
