//! Rendered tile cache
//!
//! Least-recently-used map of rendered tiles. Each entry remembers the
//! render version it was produced at so the planner can tell a fresh tile
//! from one left over by an earlier generation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::worker::TilePeaks;

/// Cache identity of a tile
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    pub file_path: String,
    pub tile_index: u32,
    pub level_factor: u32,
}

impl TileCacheKey {
    pub fn new(file_path: impl Into<String>, tile_index: u32, level_factor: u32) -> Self {
        Self {
            file_path: file_path.into(),
            tile_index,
            level_factor,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedTile {
    render_version: u64,
    peaks: Arc<TilePeaks>,
    used: u64,
}

/// LRU tile cache bounded to `limit` entries
#[derive(Debug, Clone)]
pub struct TileCache {
    entries: HashMap<TileCacheKey, CachedTile>,
    limit: usize,
    tick: u64,
}

impl TileCache {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            limit: limit.max(1),
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Cached tile, marking it as recently used
    pub fn get(&mut self, key: &TileCacheKey) -> Option<Arc<TilePeaks>> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        entry.used = tick;
        Some(Arc::clone(&entry.peaks))
    }

    /// Whether the tile is cached at `render_version`
    pub fn is_current(&self, key: &TileCacheKey, render_version: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.render_version == render_version)
    }

    /// Version the tile was rendered at, if cached
    pub fn version_of(&self, key: &TileCacheKey) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.render_version)
    }

    /// Store a tile (last write wins), then prune past the limit
    pub fn insert(&mut self, key: TileCacheKey, render_version: u64, peaks: Arc<TilePeaks>) {
        let used = self.next_tick();
        self.entries.insert(
            key,
            CachedTile {
                render_version,
                peaks,
                used,
            },
        );
        self.prune();
    }

    fn prune(&mut self) {
        if self.entries.len() <= self.limit {
            return;
        }
        let excess = self.entries.len() - self.limit;
        let mut by_age: Vec<(u64, TileCacheKey)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.used, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(used, _)| *used);
        for (_, key) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        log::trace!("TileCache: pruned {} tiles", excess);
    }

    /// Drop every tile of one file
    pub fn invalidate_file(&mut self, file_path: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.file_path != file_path);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peaks() -> Arc<TilePeaks> {
        Arc::new(TilePeaks::default())
    }

    #[test]
    fn test_insert_and_version() {
        let mut cache = TileCache::new(8);
        let key = TileCacheKey::new("/a.wav", 0, 2);
        cache.insert(key.clone(), 3, peaks());
        assert!(cache.is_current(&key, 3));
        assert!(!cache.is_current(&key, 4));
        assert!(!cache.is_current(&TileCacheKey::new("/a.wav", 0, 4), 3));
        cache.insert(key.clone(), 4, peaks());
        assert_eq!(cache.version_of(&key), Some(4));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_prunes_least_recently_used() {
        let mut cache = TileCache::new(2);
        let a = TileCacheKey::new("/a.wav", 0, 1);
        let b = TileCacheKey::new("/a.wav", 1, 1);
        let c = TileCacheKey::new("/a.wav", 2, 1);
        cache.insert(a.clone(), 1, peaks());
        cache.insert(b.clone(), 1, peaks());
        assert!(cache.get(&a).is_some());
        cache.insert(c.clone(), 1, peaks());
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn test_invalidate_file() {
        let mut cache = TileCache::new(8);
        cache.insert(TileCacheKey::new("/a.wav", 0, 1), 1, peaks());
        cache.insert(TileCacheKey::new("/a.wav", 1, 1), 1, peaks());
        cache.insert(TileCacheKey::new("/b.wav", 0, 1), 1, peaks());
        assert_eq!(cache.invalidate_file("/a.wav"), 2);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
