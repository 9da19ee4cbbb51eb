//! Region header and sector allocator.
//!
//! The header consists of two tables:
//! - Location table: 1024 x (3-byte sector offset, 1-byte sector count)
//! - Timestamp table: 1024 x 4-byte UNIX time of the last save
//!
//! Both are read and written directly on the stream; nothing is cached, so
//! a `RegionHeader` is cheap to create for the span of a single operation.

use crate::guard::RetainPosition;
use crate::payload;
use crate::stream::RegionStream;
use crate::{HEADER_BYTES, MAX_SECTOR_OFFSET, SECTOR_BYTES, SLOTS};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use log::{debug, info};
use std::collections::BTreeSet;
use std::io::{Read, SeekFrom};
use strata_common::types::REGION_CHUNKS;
use strata_common::{RegionPos, Result, StrataError};
use strata_logger::systime;

/// Where a chunk lives in its region file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocation {
    pub offset: u32,
    pub sectors: u8,
    pub timestamp: u32,
}

/// Location table entry; `(0, 0)` means the chunk was never generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Slot {
    offset: u32,
    sectors: u8,
}

impl Slot {
    const EMPTY: Slot = Slot {
        offset: 0,
        sectors: 0,
    };

    fn is_empty(&self) -> bool {
        self.offset == 0 && self.sectors == 0
    }

    fn end(&self) -> u32 {
        self.offset + self.sectors as u32
    }

    fn overlaps(&self, start: u32, count: u32) -> bool {
        self.sectors > 0 && self.offset < start + count && start < self.end()
    }

    /// Rejects an entry that points into the header sectors.
    fn checked(self, index: usize) -> Result<Slot> {
        if self.sectors > 0 && self.offset < 2 {
            return Err(StrataError::bounds(format!(
                "Slot {} points at sector {}, sectors 0 and 1 are reserved for the header",
                index, self.offset
            )));
        }
        Ok(self)
    }
}

/// Wraps a caller-owned region stream. The stream is borrowed, never closed,
/// and its cursor is left where the caller put it.
pub struct RegionHeader<'a, S: RegionStream> {
    stream: &'a mut S,
    pos: RegionPos,
}

impl<'a, S: RegionStream> RegionHeader<'a, S> {
    /// Wraps `stream`, writing the two empty header sectors if it is shorter
    /// than a header.
    pub fn open(pos: RegionPos, stream: &'a mut S) -> Result<Self> {
        {
            let mut stream = RetainPosition::new(&mut *stream)?;
            let len = stream.seek(SeekFrom::End(0))?;
            if len < HEADER_BYTES {
                stream.write_all(&vec![0u8; (HEADER_BYTES - len) as usize])?;
            }
        }
        Ok(RegionHeader { stream, pos })
    }

    pub fn pos(&self) -> RegionPos {
        self.pos
    }

    /// Slot index for global chunk coordinates, which must lie in this region.
    fn slot_index(&self, x: i32, z: i32) -> Result<usize> {
        let local_x = x - self.pos.x * REGION_CHUNKS;
        let local_z = z - self.pos.z * REGION_CHUNKS;
        if !(0..REGION_CHUNKS).contains(&local_x) || !(0..REGION_CHUNKS).contains(&local_z) {
            return Err(StrataError::bounds(format!(
                "Chunk ({}, {}) is not in region ({}, {})",
                x, z, self.pos.x, self.pos.z
            )));
        }
        Ok((local_x + local_z * REGION_CHUNKS) as usize)
    }

    pub fn locate(&mut self, x: i32, z: i32) -> Result<Option<ChunkLocation>> {
        let index = self.slot_index(x, z)?;
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        let slot = read_slot(&mut *stream, index)?;
        if slot.is_empty() {
            return Ok(None);
        }
        let timestamp = read_timestamp(&mut *stream, index)?;
        Ok(Some(ChunkLocation {
            offset: slot.offset,
            sectors: slot.sectors,
            timestamp,
        }))
    }

    /// Overwrites a location entry as is. Only range validity is checked, not
    /// overlap with other chunks.
    pub fn set_location(&mut self, x: i32, z: i32, offset: u32, sectors: u8) -> Result<()> {
        let index = self.slot_index(x, z)?;
        if offset > MAX_SECTOR_OFFSET {
            return Err(StrataError::bounds(format!(
                "Sector offset {} does not fit in 3 bytes",
                offset
            )));
        }
        if sectors > 0 && offset < 2 {
            return Err(StrataError::bounds(
                "Sectors 0 and 1 are reserved for the header",
            ));
        }
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        write_slot(&mut *stream, index, Slot { offset, sectors })
    }

    /// Stamps the chunk with the current time.
    pub fn mark_update(&mut self, x: i32, z: i32) -> Result<()> {
        self.mark_update_at(x, z, systime::unix_timestamp() as u32)
    }

    pub fn mark_update_at(&mut self, x: i32, z: i32, timestamp: u32) -> Result<()> {
        let index = self.slot_index(x, z)?;
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        write_timestamp(&mut *stream, index, timestamp)
    }

    /// Changes the number of sectors held by a chunk, allocating, growing in
    /// place, relocating or shrinking as needed. Sector contents of a
    /// relocated chunk move with it; freed sectors are zeroed.
    pub fn resize(&mut self, x: i32, z: i32, sectors: u8) -> Result<()> {
        let index = self.slot_index(x, z)?;
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        resize_slot(&mut *stream, index, sectors)
    }

    /// Frees the chunk's sectors and marks it as never generated.
    pub fn delete_chunk(&mut self, x: i32, z: i32) -> Result<()> {
        self.resize(x, z, 0)
    }

    /// Decompressed tag bytes of a chunk, `None` if it was never generated.
    pub fn read_chunk(&mut self, x: i32, z: i32) -> Result<Option<Vec<u8>>> {
        let index = self.slot_index(x, z)?;
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        let slot = read_slot(&mut *stream, index)?;
        if slot.is_empty() {
            return Ok(None);
        }
        stream.seek(SeekFrom::Start(slot.offset as u64 * SECTOR_BYTES))?;
        let capacity = slot.sectors as usize * SECTOR_BYTES as usize;
        payload::decode(&mut *stream, capacity).map(Some)
    }

    /// Compresses and stores tag bytes for a chunk, resizing its allocation
    /// when the sector count changes, then stamps it with the current time.
    pub fn write_chunk(&mut self, x: i32, z: i32, data: &[u8], level: Compression) -> Result<()> {
        let index = self.slot_index(x, z)?;
        let framed = payload::encode(data, level)?;
        let needed = payload::sectors_for(framed.len());
        let needed = u8::try_from(needed).map_err(|_| {
            StrataError::bounds(format!(
                "Chunk ({}, {}) needs {} sectors, at most 255 fit",
                x, z, needed
            ))
        })?;

        let mut stream = RetainPosition::new(&mut *self.stream)?;
        let current = read_slot(&mut *stream, index)?;
        if current.sectors != needed {
            debug!(
                "Chunk ({}, {}) resized from {} to {} sectors",
                x, z, current.sectors, needed
            );
            resize_slot(&mut *stream, index, needed)?;
        }
        let slot = read_slot(&mut *stream, index)?;

        let start = slot.offset as u64 * SECTOR_BYTES;
        stream.seek(SeekFrom::Start(start))?;
        stream.write_all(&framed)?;
        let padding = needed as usize * SECTOR_BYTES as usize - framed.len();
        stream.write_all(&vec![0u8; padding])?;

        let end = stream.stream_position()?;
        if end % SECTOR_BYTES != 0 || end != start + needed as u64 * SECTOR_BYTES {
            return Err(StrataError::invariant(format!(
                "Chunk ({}, {}) write ended at byte {}, not on its sector boundary",
                x, z, end
            )));
        }
        write_timestamp(&mut *stream, index, systime::unix_timestamp() as u32)
    }

    /// Rewrites every chunk contiguously from sector 2 in slot order and
    /// truncates the stream to fit.
    pub fn pack(&mut self) -> Result<()> {
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        let slots = read_slots(&mut *stream)?
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.checked(index))
            .collect::<Result<Vec<_>>>()?;

        // source and destination ranges may overlap, so copy everything out first
        let mut scratch = Vec::new();
        let mut occupied = Vec::new();
        for (index, slot) in slots.iter().enumerate() {
            if slot.sectors == 0 {
                continue;
            }
            let len = slot.sectors as usize * SECTOR_BYTES as usize;
            stream.seek(SeekFrom::Start(slot.offset as u64 * SECTOR_BYTES))?;
            let before = scratch.len();
            Read::take(&mut *stream, len as u64).read_to_end(&mut scratch)?;
            scratch.resize(before + len, 0);
            occupied.push((index, slot.sectors));
        }

        let mut next: u32 = 2;
        let mut cursor = 0;
        stream.seek(SeekFrom::Start(next as u64 * SECTOR_BYTES))?;
        for &(index, sectors) in &occupied {
            let len = sectors as usize * SECTOR_BYTES as usize;
            stream.write_all(&scratch[cursor..cursor + len])?;
            write_slot_at(&mut *stream, index, Slot { offset: next, sectors }, next + sectors as u32)?;
            next += sectors as u32;
            cursor += len;
        }

        let old_len = stream.seek(SeekFrom::End(0))?;
        let new_len = next as u64 * SECTOR_BYTES;
        stream.set_len(new_len)?;
        info!(
            "Packed region ({}, {}): {} chunks, {} -> {} bytes",
            self.pos.x,
            self.pos.z,
            occupied.len(),
            old_len,
            new_len
        );
        Ok(())
    }

    /// Number of generated chunks.
    pub fn chunk_count(&mut self) -> Result<usize> {
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        let slots = read_slots(&mut *stream)?;
        Ok(slots.iter().filter(|slot| !slot.is_empty()).count())
    }

    /// Sum of the sector counts of all generated chunks.
    pub fn sector_count(&mut self) -> Result<u32> {
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        let slots = read_slots(&mut *stream)?;
        Ok(slots.iter().map(|slot| slot.sectors as u32).sum())
    }

    /// Length of the stream in sectors, header included.
    pub fn file_sector_count(&mut self) -> Result<u32> {
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        end_sector(&mut *stream)
    }

    /// Data sectors that no chunk references, e.g. left behind by an
    /// interrupted resize.
    pub fn find_holes(&mut self) -> Result<BTreeSet<u32>> {
        let mut stream = RetainPosition::new(&mut *self.stream)?;
        let file_sectors = end_sector(&mut *stream)?;
        let mut holes: BTreeSet<u32> = (2..file_sectors).collect();
        for slot in read_slots(&mut *stream)? {
            for sector in slot.offset..slot.end() {
                holes.remove(&sector);
            }
        }
        Ok(holes)
    }
}

// The helpers below move the cursor freely; public methods guard it.

fn read_slot<S: RegionStream>(stream: &mut S, index: usize) -> Result<Slot> {
    stream.seek(SeekFrom::Start(index as u64 * 4))?;
    let location = stream.read_u32::<BigEndian>().map_err(StrataError::from_decode)?;
    Slot {
        offset: location >> 8,
        sectors: (location & 0xFF) as u8,
    }
    .checked(index)
}

fn read_slots<S: RegionStream>(stream: &mut S) -> Result<Vec<Slot>> {
    stream.seek(SeekFrom::Start(0))?;
    let mut table = vec![0u8; SLOTS * 4];
    stream.read_exact(&mut table).map_err(StrataError::from_decode)?;
    Ok(table
        .chunks_exact(4)
        .map(|entry| Slot {
            offset: u32::from_be_bytes([0, entry[0], entry[1], entry[2]]),
            sectors: entry[3],
        })
        .collect())
}

fn write_slot<S: RegionStream>(stream: &mut S, index: usize, slot: Slot) -> Result<()> {
    stream.seek(SeekFrom::Start(index as u64 * 4))?;
    stream.write_u32::<BigEndian>((slot.offset << 8) | slot.sectors as u32)?;
    Ok(())
}

/// Writes a slot and leaves the cursor at sector `resume`.
fn write_slot_at<S: RegionStream>(stream: &mut S, index: usize, slot: Slot, resume: u32) -> Result<()> {
    write_slot(stream, index, slot)?;
    stream.seek(SeekFrom::Start(resume as u64 * SECTOR_BYTES))?;
    Ok(())
}

fn read_timestamp<S: RegionStream>(stream: &mut S, index: usize) -> Result<u32> {
    stream.seek(SeekFrom::Start(SECTOR_BYTES + index as u64 * 4))?;
    stream.read_u32::<BigEndian>().map_err(StrataError::from_decode)
}

fn write_timestamp<S: RegionStream>(stream: &mut S, index: usize, timestamp: u32) -> Result<()> {
    stream.seek(SeekFrom::Start(SECTOR_BYTES + index as u64 * 4))?;
    stream.write_u32::<BigEndian>(timestamp)?;
    Ok(())
}

fn end_sector<S: RegionStream>(stream: &mut S) -> Result<u32> {
    let len = stream.seek(SeekFrom::End(0))?;
    if len % SECTOR_BYTES != 0 {
        return Err(StrataError::invariant(format!(
            "Region length {} is not sector aligned",
            len
        )));
    }
    if len < HEADER_BYTES {
        return Err(StrataError::invariant(format!(
            "Region length {} is shorter than its header",
            len
        )));
    }
    Ok((len / SECTOR_BYTES) as u32)
}

/// First sector past both the end of the stream and every allocated range
/// other than slot `except`.
fn alloc<S: RegionStream>(stream: &mut S, sectors: u8, except: Option<usize>) -> Result<u32> {
    let end = end_sector(stream)?;
    let highest = read_slots(stream)?
        .iter()
        .enumerate()
        .filter(|&(index, _)| Some(index) != except)
        .map(|(_, slot)| slot.end())
        .max()
        .unwrap_or(0);
    let offset = end.max(highest);
    if offset + sectors as u32 > MAX_SECTOR_OFFSET {
        return Err(StrataError::bounds(format!(
            "Region is full, cannot allocate {} sectors at {}",
            sectors, offset
        )));
    }
    Ok(offset)
}

/// Brute force check that no chunk other than slot `except` uses any sector
/// of `[start, start+count)`.
fn is_free<S: RegionStream>(stream: &mut S, start: u32, count: u32, except: Option<usize>) -> Result<bool> {
    if start < 2 {
        return Err(StrataError::bounds(
            "Sectors 0 and 1 are reserved for the header",
        ));
    }
    Ok(!read_slots(stream)?
        .iter()
        .enumerate()
        .any(|(index, slot)| Some(index) != except && slot.overlaps(start, count)))
}

fn zero_sectors<S: RegionStream>(stream: &mut S, start: u32, count: u32) -> Result<()> {
    stream.seek(SeekFrom::Start(start as u64 * SECTOR_BYTES))?;
    stream.write_all(&vec![0u8; count as usize * SECTOR_BYTES as usize])?;
    Ok(())
}

fn resize_slot<S: RegionStream>(stream: &mut S, index: usize, sectors: u8) -> Result<()> {
    let slot = read_slot(stream, index)?;

    // the chunk exists and shrank
    if !slot.is_empty() && sectors < slot.sectors {
        if sectors == 0 {
            write_slot(stream, index, Slot::EMPTY)?;
            return zero_sectors(stream, slot.offset, slot.sectors as u32);
        }
        write_slot(stream, index, Slot { offset: slot.offset, sectors })?;
        return zero_sectors(
            stream,
            slot.offset + sectors as u32,
            (slot.sectors - sectors) as u32,
        );
    }

    // the chunk doesn't exist
    if slot.is_empty() {
        if sectors == 0 {
            return Ok(());
        }
        let offset = alloc(stream, sectors, None)?;
        write_slot(stream, index, Slot { offset, sectors })?;
        return zero_sectors(stream, offset, sectors as u32);
    }

    if sectors == slot.sectors {
        return Ok(());
    }

    // the chunk grew; its own sectors never count as taken, and the
    // slot keeps its old entry until the new range is written
    if is_free(stream, slot.offset, sectors as u32, Some(index))? {
        zero_sectors(stream, slot.end(), (sectors - slot.sectors) as u32)?;
        return write_slot(stream, index, Slot { offset: slot.offset, sectors });
    }

    let offset = alloc(stream, sectors, Some(index))?;
    debug!(
        "Relocating slot {} from sector {} to {} ({} -> {} sectors)",
        index, slot.offset, offset, slot.sectors, sectors
    );
    let len = slot.sectors as usize * SECTOR_BYTES as usize;
    let mut data = Vec::with_capacity(len);
    stream.seek(SeekFrom::Start(slot.offset as u64 * SECTOR_BYTES))?;
    Read::take(&mut *stream, len as u64).read_to_end(&mut data)?;
    data.resize(len, 0);

    stream.seek(SeekFrom::Start(offset as u64 * SECTOR_BYTES))?;
    stream.write_all(&data)?;
    stream.write_all(&vec![0u8; (sectors - slot.sectors) as usize * SECTOR_BYTES as usize])?;
    write_slot(stream, index, Slot { offset, sectors })?;
    zero_sectors(stream, slot.offset, slot.sectors as u32)
}
