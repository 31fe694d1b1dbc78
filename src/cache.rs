//! Sparse chunk store keyed by packed chunk coordinate.
//!
//! Lock order: the map lock is always taken before a chunk's own lock,
//! never the other way round.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::chunk::{Chunk, ChunkState};
use crate::polygon::Polygons;
use crate::types::ChunkId;

pub type SharedChunk = Arc<Mutex<Chunk>>;

pub struct ChunkCache {
    chunks: RwLock<HashMap<u64, SharedChunk>>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    pub fn contains(&self, id: ChunkId) -> bool {
        self.chunks.read().contains_key(&id.pack())
    }

    pub fn get(&self, id: ChunkId) -> Option<SharedChunk> {
        self.chunks.read().get(&id.pack()).cloned()
    }

    /// Fetch the chunk, creating an `Empty` one on first reference.
    pub fn get_or_create(&self, id: ChunkId) -> SharedChunk {
        if let Some(chunk) = self.get(id) {
            return chunk;
        }
        let mut chunks = self.chunks.write();
        match chunks.entry(id.pack()) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(v) => {
                let chunk = Arc::new(Mutex::new(Chunk::new(id)));
                v.insert(chunk.clone());
                chunk
            }
        }
    }

    /// Insert a prepared chunk (used when loading saves), replacing any
    /// existing entry.
    pub fn insert(&self, chunk: Chunk) {
        let key = chunk.id().pack();
        self.chunks.write().insert(key, Arc::new(Mutex::new(chunk)));
    }

    /// Drop the chunk if it carries no damage and is neither active nor
    /// placed.  Damaged chunks are never evicted.
    pub fn evict_if_clean(&self, id: ChunkId) -> bool {
        let mut chunks = self.chunks.write();
        let Entry::Occupied(entry) = chunks.entry(id.pack()) else {
            return false;
        };
        {
            let mut chunk = entry.get().lock();
            if !chunk.can_evict() {
                return false;
            }
            chunk.mark_evicted();
        }
        entry.remove();
        debug!("Evicted chunk {}", id);
        true
    }

    pub fn ids(&self) -> Vec<ChunkId> {
        let mut ids: Vec<_> = self
            .chunks
            .read()
            .keys()
            .map(|k| ChunkId::unpack(*k))
            .collect();
        ids.sort();
        ids
    }

    /// Damage of every chunk that must be persisted, ordered by id.
    pub fn damaged_chunks(&self) -> Vec<(ChunkId, Polygons)> {
        let mut saved: Vec<_> = self
            .chunks
            .read()
            .values()
            .filter_map(|chunk| {
                let chunk = chunk.lock();
                if chunk.should_save() {
                    Some((chunk.id(), chunk.damage().clone()))
                } else {
                    None
                }
            })
            .collect();
        saved.sort_by_key(|(id, _)| *id);
        saved
    }

    pub fn count_in_state(&self, state: ChunkState) -> usize {
        self.chunks
            .read()
            .values()
            .filter(|c| c.lock().state() == state)
            .count()
    }

    pub fn damaged_count(&self) -> usize {
        self.chunks
            .read()
            .values()
            .filter(|c| c.lock().should_save())
            .count()
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}
