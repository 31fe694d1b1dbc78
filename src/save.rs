//! Terrain save format.
//!
//! Only the seed and per-chunk damage are stored; every other chunk, and the
//! undamaged geometry of damaged ones, regenerates from the seed.  All
//! integers are little-endian.
//!
//! | Field                | Type        | Notes                              |
//! |----------------------|-------------|------------------------------------|
//! | `seed`               | `i64`       | bit pattern of the `u64` seed      |
//! | `saved_chunk_count`  | `i32`       |                                    |
//! | per chunk: `id`      | `u64`       | [`ChunkId::pack`]                  |
//! | per chunk: `damage_polygon_count` | `i32` |                             |
//! | per polygon: `point_count` | `i32` | followed by `(x: i32, y: i32)` pairs |
//!
//! Chunk size and noise constants are not stored; loading with different
//! ones yields different terrain.

use std::fs;
use std::path::Path;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::info;

use crate::error::{Result, TerrainError};
use crate::polygon::Polygons;
use crate::types::{ChunkId, Point};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedChunk {
    pub id: ChunkId,
    pub damage: Polygons,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSave {
    pub seed: u64,
    pub chunks: Vec<SavedChunk>,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

pub fn encode(save: &WorldSave) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    buf.put_i64_le(save.seed as i64);
    buf.put_i32_le(count(save.chunks.len(), "saved_chunk_count")?);

    for chunk in &save.chunks {
        buf.put_u64_le(chunk.id.pack());
        buf.put_i32_le(count(chunk.damage.contours.len(), "damage_polygon_count")?);
        for contour in &chunk.damage.contours {
            buf.put_i32_le(count(contour.len(), "point_count")?);
            for p in contour {
                buf.put_i32_le(p.x);
                buf.put_i32_le(p.y);
            }
        }
    }

    Ok(buf.freeze())
}

fn count(len: usize, field: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| TerrainError::InvalidSave(format!("{field} {len} exceeds i32")))
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

pub fn decode(mut data: &[u8]) -> Result<WorldSave> {
    let seed = read_i64(&mut data, "seed")? as u64;
    let chunk_count = read_count(&mut data, "saved_chunk_count")?;

    let mut chunks = Vec::with_capacity(chunk_count.min(4096));
    for _ in 0..chunk_count {
        let id = ChunkId::unpack(read_u64(&mut data, "chunk id")?);
        let polygon_count = read_count(&mut data, "damage_polygon_count")?;

        // Contours are kept exactly as written, without re-cleaning.
        let mut contours = Vec::with_capacity(polygon_count.min(4096));
        for _ in 0..polygon_count {
            let point_count = read_count(&mut data, "point_count")?;
            let mut contour = Vec::with_capacity(point_count.min(1 << 16));
            for _ in 0..point_count {
                let x = read_i32(&mut data, "point x")?;
                let y = read_i32(&mut data, "point y")?;
                contour.push(Point::new(x, y));
            }
            contours.push(contour);
        }

        chunks.push(SavedChunk {
            id,
            damage: Polygons { contours },
        });
    }

    if data.has_remaining() {
        return Err(TerrainError::InvalidSave(format!(
            "{} trailing bytes",
            data.remaining()
        )));
    }

    Ok(WorldSave { seed, chunks })
}

fn read_i64(data: &mut &[u8], field: &'static str) -> Result<i64> {
    if data.remaining() < 8 {
        return Err(TerrainError::TruncatedSave(field));
    }
    Ok(data.get_i64_le())
}

fn read_u64(data: &mut &[u8], field: &'static str) -> Result<u64> {
    if data.remaining() < 8 {
        return Err(TerrainError::TruncatedSave(field));
    }
    Ok(data.get_u64_le())
}

fn read_i32(data: &mut &[u8], field: &'static str) -> Result<i32> {
    if data.remaining() < 4 {
        return Err(TerrainError::TruncatedSave(field));
    }
    Ok(data.get_i32_le())
}

fn read_count(data: &mut &[u8], field: &'static str) -> Result<usize> {
    let n = read_i32(data, field)?;
    usize::try_from(n).map_err(|_| TerrainError::InvalidSave(format!("negative {field}: {n}")))
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

pub fn write_to_path(save: &WorldSave, path: &Path) -> Result<()> {
    let data = encode(save)?;
    fs::write(path, &data)?;
    info!(
        "Saved terrain seed={} ({} damaged chunks, {} bytes) to {}",
        save.seed,
        save.chunks.len(),
        data.len(),
        path.display()
    );
    Ok(())
}

pub fn read_from_path(path: &Path) -> Result<WorldSave> {
    let data = fs::read(path)?;
    let save = decode(&data)?;
    info!(
        "Read terrain seed={} ({} damaged chunks) from {}",
        save.seed,
        save.chunks.len(),
        path.display()
    );
    Ok(save)
}
