//! A save directory: `level.dat` metadata plus one [`World`] per dimension.
//!
//! ```text
//! <root>/
//!   level.dat   gzip NBT, root compound holding `Data`
//!   region/     overworld
//!   DIM-1/      nether
//!   DIM1/       end
//! ```

use crate::config::WorldConfig;
use crate::world::World;
use log::info;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use strata_common::{Result, StrataError};
use strata_logger::systime;
use strata_nbt::{Compound, NbtFile, Tag};

pub const LEVEL_FILE: &str = "level.dat";
pub const OVERWORLD_DIR: &str = "region";
pub const NETHER_DIR: &str = "DIM-1";
pub const END_DIR: &str = "DIM1";

#[derive(Debug)]
pub struct Level {
    path: PathBuf,
    name: String,
    data: Compound,
    /// Root entries other than `Data`, written back untouched.
    extra: Compound,
    pub overworld: World,
    pub nether: World,
    pub end: World,
}

impl Level {
    /// Opens or creates the save at `path`. Entries of `options` overwrite
    /// the matching entries of the `Data` compound; nothing is written until
    /// [`write_level_options`](Level::write_level_options) or
    /// [`write_all`](Level::write_all).
    pub fn open(path: impl AsRef<Path>, options: Option<Compound>, config: WorldConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let level_file = path.join(LEVEL_FILE);
        let (name, extra, mut data) = if level_file.exists() {
            let mut reader = BufReader::new(File::open(&level_file)?);
            split_metadata(NbtFile::read_gzip(&mut reader)?)?
        } else {
            info!("No {} in {}, using defaults", LEVEL_FILE, path.display());
            (String::new(), Compound::new(), default_data())
        };
        if let Some(options) = options {
            data.extend(options);
        }

        Ok(Level {
            overworld: World::open(path.join(OVERWORLD_DIR), config.clone())?,
            nether: World::open(path.join(NETHER_DIR), config.clone())?,
            end: World::open(path.join(END_DIR), config)?,
            path,
            name,
            data,
            extra,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `Data` compound of `level.dat`.
    pub fn level_options(&self) -> &Compound {
        &self.data
    }

    pub fn level_options_mut(&mut self) -> &mut Compound {
        &mut self.data
    }

    /// The whole `level.dat` document.
    pub fn metadata(&self) -> NbtFile {
        let mut root = Compound::new();
        root.insert("Data".to_string(), Tag::Compound(self.data.clone()));
        root.extend(self.extra.clone());
        NbtFile::new(self.name.clone(), Tag::Compound(root))
    }

    pub fn write_level_options(&self) -> Result<()> {
        let mut writer = BufWriter::new(File::create(self.path.join(LEVEL_FILE))?);
        self.metadata().write_gzip(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes `level.dat` and every dimension's cached chunks.
    pub fn write_all(&mut self) -> Result<()> {
        self.write_level_options()?;
        self.overworld.flush_all()?;
        self.nether.flush_all()?;
        self.end.flush_all()
    }

    /// Writes everything, then closes every region file.
    pub fn close(self) -> Result<()> {
        self.write_level_options()?;
        self.overworld.close()?;
        self.nether.close()?;
        self.end.close()
    }
}

/// Splits a document into its root name, its root compound and `Data`.
fn split_metadata(file: NbtFile) -> Result<(String, Compound, Compound)> {
    let mut root = match file.root {
        Tag::Compound(root) => root,
        _ => {
            return Err(StrataError::format(format!(
                "{} root is not a compound",
                LEVEL_FILE
            )))
        }
    };
    match root.shift_remove("Data") {
        Some(Tag::Compound(data)) => Ok((file.name, root, data)),
        _ => Err(StrataError::format(format!(
            "{} has no Data compound",
            LEVEL_FILE
        ))),
    }
}

fn default_data() -> Compound {
    let mut data = Compound::new();
    data.insert("version".to_string(), Tag::Int(19133));
    data.insert("DataVersion".to_string(), Tag::Int(169));
    data.insert("LevelName".to_string(), Tag::String("world".to_string()));
    data.insert("generatorName".to_string(), Tag::String("flat".to_string()));
    data.insert("generatorVersion".to_string(), Tag::Int(0));
    data.insert("RandomSeed".to_string(), Tag::Long(0));
    data.insert("GameType".to_string(), Tag::Int(1));
    data.insert("MapFeatures".to_string(), Tag::Byte(0));
    data.insert("hardcore".to_string(), Tag::Byte(0));
    data.insert("allowCommands".to_string(), Tag::Byte(1));
    data.insert("initialized".to_string(), Tag::Byte(1));
    data.insert("SpawnX".to_string(), Tag::Int(0));
    data.insert("SpawnY".to_string(), Tag::Int(64));
    data.insert("SpawnZ".to_string(), Tag::Int(0));
    data.insert("Time".to_string(), Tag::Long(0));
    data.insert("DayTime".to_string(), Tag::Long(0));
    data.insert(
        "LastPlayed".to_string(),
        Tag::Long(systime::unix_timestamp() * 1000),
    );
    data.insert("raining".to_string(), Tag::Byte(0));
    data.insert("rainTime".to_string(), Tag::Int(0));
    data.insert("thundering".to_string(), Tag::Byte(0));
    data.insert("thunderTime".to_string(), Tag::Int(0));
    data
}
