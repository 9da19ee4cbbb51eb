//! Block level access to one dimension's region files, through bounded
//! caches of open region files and decoded chunks.
//!
//! Changes live in the chunk cache until the chunk is evicted or flushed.
//! Every cached chunk's region file is open: evicting a region first writes
//! back and drops all of its chunks.

use crate::config::WorldConfig;
use crate::lru::LruTracker;
use log::{debug, info};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use strata_chunk::chunk::check_bounds;
use strata_chunk::{Block, Chunk};
use strata_common::{ChunkPos, RegionPos, Result, StrataError};
use strata_region::RegionHeader;

#[derive(Debug)]
pub struct World {
    path: PathBuf,
    config: WorldConfig,
    regions: HashMap<RegionPos, File>,
    chunks: HashMap<ChunkPos, Chunk>,
    lru: LruTracker<ChunkPos>,
}

impl World {
    /// Opens the region directory at `path`, creating it if needed. No
    /// region file is touched until a chunk in it is requested.
    pub fn open(path: impl AsRef<Path>, config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        Ok(World {
            path,
            config,
            regions: HashMap::new(),
            chunks: HashMap::new(),
            lru: LruTracker::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn region_path(&self, pos: RegionPos) -> PathBuf {
        self.path.join(pos.file_name(&self.config.region_extension))
    }

    /// Block at global coordinates. `None` if its section was never created.
    pub fn get_block(&mut self, x: i32, y: i32, z: i32) -> Result<Option<Block>> {
        check_bounds(x & 15, y, z & 15)?;
        self.chunk(ChunkPos::from_block(x, z))?
            .get_block(x & 15, y, z & 15)
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) -> Result<()> {
        check_bounds(x & 15, y, z & 15)?;
        block.check()?;
        self.chunk_mut(ChunkPos::from_block(x, z))?
            .set_block(x & 15, y, z & 15, block)
    }

    /// Sets the biome of the global block column (x, z).
    pub fn set_biome(&mut self, x: i32, z: i32, id: u8, default: u8) -> Result<()> {
        self.chunk_mut(ChunkPos::from_block(x, z))?
            .set_biome(x & 15, z & 15, id, default)
    }

    /// Sets every block of the box starting at (x, y, z).
    #[allow(clippy::too_many_arguments)]
    pub fn fill_region(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        size_x: i32,
        height: i32,
        size_z: i32,
        block: Block,
    ) -> Result<()> {
        for bz in z..z + size_z {
            for bx in x..x + size_x {
                for by in y..y + height {
                    self.set_block(bx, by, bz, block)?;
                }
            }
        }
        Ok(())
    }

    /// Loads every chunk of the area, creating the missing ones, and sets
    /// their terrain populated flag.
    pub fn initialize_area(
        &mut self,
        chunk_x: i32,
        chunk_z: i32,
        size_x: i32,
        size_z: i32,
        terrain_populated: bool,
    ) -> Result<()> {
        for cz in chunk_z..chunk_z + size_z {
            for cx in chunk_x..chunk_x + size_x {
                self.chunk_mut(ChunkPos::new(cx, cz))?.terrain_populated = terrain_populated as i8;
            }
        }
        Ok(())
    }

    pub fn chunk(&mut self, pos: ChunkPos) -> Result<&Chunk> {
        self.load_chunk(pos)?;
        self.chunks
            .get(&pos)
            .ok_or_else(|| StrataError::invariant(format!("Chunk {:?} vanished from the cache", pos)))
    }

    pub fn chunk_mut(&mut self, pos: ChunkPos) -> Result<&mut Chunk> {
        self.load_chunk(pos)?;
        self.chunks
            .get_mut(&pos)
            .ok_or_else(|| StrataError::invariant(format!("Chunk {:?} vanished from the cache", pos)))
    }

    pub fn is_cached(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn cached_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn cached_regions(&self) -> usize {
        self.regions.len()
    }

    /// Reads a chunk straight from its region file, ignoring the cache and
    /// any changes held in it.
    pub fn read_chunk_from_disk(&self, pos: ChunkPos) -> Result<Option<Chunk>> {
        let bytes = match fs::read(self.region_path(pos.region())) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut cursor = Cursor::new(bytes);
        let mut header = RegionHeader::open(pos.region(), &mut cursor)?;
        match header.read_chunk(pos.x, pos.z)? {
            Some(bytes) => Chunk::from_bytes(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Writes every cached chunk back to its region file. Nothing is evicted.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut positions: Vec<ChunkPos> = self.chunks.keys().copied().collect();
        positions.sort();
        for pos in positions {
            self.flush_chunk(pos)?;
        }
        Ok(())
    }

    /// Drops every cached chunk and closes every region file without
    /// writing anything back.
    pub fn clear_cache(&mut self) {
        debug!(
            "Discarding {} cached chunks in {}",
            self.chunks.len(),
            self.path.display()
        );
        self.chunks.clear();
        self.lru.clear();
        self.regions.clear();
    }

    /// Flushes everything, then closes the region files.
    pub fn close(mut self) -> Result<()> {
        self.flush_all()?;
        self.regions.clear();
        Ok(())
    }

    fn load_chunk(&mut self, pos: ChunkPos) -> Result<()> {
        if self.chunks.contains_key(&pos) {
            self.lru.touch(pos);
            return Ok(());
        }

        let region = pos.region();
        self.open_region(region)?;
        let file = self.region_file(region)?;
        let chunk = match RegionHeader::open(region, file)?.read_chunk(pos.x, pos.z)? {
            Some(bytes) => Chunk::from_bytes(&bytes)?,
            None => Chunk::new(pos.x, pos.z),
        };

        while self.chunks.len() >= self.config.max_chunks {
            match self.lru.oldest() {
                Some(victim) => self.evict_chunk(victim)?,
                None => break,
            }
        }
        self.chunks.insert(pos, chunk);
        self.lru.touch(pos);
        Ok(())
    }

    fn open_region(&mut self, pos: RegionPos) -> Result<()> {
        if self.regions.contains_key(&pos) {
            return Ok(());
        }

        while self.regions.len() >= self.config.max_regions {
            // a region is as old as its newest cached chunk
            let victim = self
                .regions
                .keys()
                .copied()
                .filter(|&region| region != pos)
                .min_by_key(|&region| (self.lru.newest_where(|chunk| region.contains(*chunk)), region));
            match victim {
                Some(victim) => self.evict_region(victim)?,
                None => break,
            }
        }

        let path = self.region_path(pos);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        RegionHeader::open(pos, &mut file)?;
        debug!("Opened region file {}", path.display());
        self.regions.insert(pos, file);
        Ok(())
    }

    fn region_file(&mut self, pos: RegionPos) -> Result<&mut File> {
        self.regions
            .get_mut(&pos)
            .ok_or_else(|| StrataError::invariant(format!("Region {:?} is not open", pos)))
    }

    fn flush_chunk(&mut self, pos: ChunkPos) -> Result<()> {
        let chunk = self
            .chunks
            .get(&pos)
            .ok_or_else(|| StrataError::invariant(format!("Chunk {:?} is not cached", pos)))?;
        let bytes = chunk.to_bytes()?;
        let level = self.config.compression();
        let region = pos.region();
        let file = self
            .regions
            .get_mut(&region)
            .ok_or_else(|| StrataError::invariant(format!("Region {:?} is not open", region)))?;
        RegionHeader::open(region, file)?.write_chunk(pos.x, pos.z, &bytes, level)
    }

    fn evict_chunk(&mut self, pos: ChunkPos) -> Result<()> {
        debug!("Evicting chunk ({}, {})", pos.x, pos.z);
        self.flush_chunk(pos)?;
        self.chunks.remove(&pos);
        self.lru.remove(pos);
        Ok(())
    }

    fn evict_region(&mut self, pos: RegionPos) -> Result<()> {
        let chunks = self.lru.keys_where(|chunk| pos.contains(*chunk));
        info!(
            "Closing region ({}, {}), writing back {} chunks",
            pos.x,
            pos.z,
            chunks.len()
        );
        for chunk in chunks {
            self.evict_chunk(chunk)?;
        }
        self.regions.remove(&pos);
        Ok(())
    }
}
