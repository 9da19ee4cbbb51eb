use log::{error, info, LevelFilter};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process::ExitCode;
use strata::world::level::{END_DIR, NETHER_DIR, OVERWORLD_DIR};
use strata::{RegionHeader, RegionPos, Result};

const USAGE: &str = "usage: strata <save-dir> [--pack]";

fn main() -> ExitCode {
    if let Err(e) = strata::logger::init(LevelFilter::Info) {
        eprintln!("failed to install logger: {}", e);
    }

    let mut args = std::env::args().skip(1);
    let Some(save) = args.next() else {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };
    let pack = match args.next().as_deref() {
        None => false,
        Some("--pack") => true,
        Some(_) => {
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };

    info!("Strata inspecting {}", save);
    for dimension in [OVERWORLD_DIR, NETHER_DIR, END_DIR] {
        let dir = Path::new(&save).join(dimension);
        if let Err(e) = inspect_dimension(&dir, pack) {
            error!("{}: {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn inspect_dimension(dir: &Path, pack: bool) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    entries.sort();

    for path in entries {
        let Some(pos) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_region_name)
        else {
            continue;
        };
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mut header = RegionHeader::open(pos, &mut file)?;
        if pack {
            header.pack()?;
        }
        let holes = header.find_holes()?;
        info!(
            "{}: {} chunks, {} of {} sectors used, {} holes",
            path.display(),
            header.chunk_count()?,
            header.sector_count()?,
            header.file_sector_count()?,
            holes.len()
        );
        if holes.len() > header.sector_count()? as usize {
            info!("{} is mostly empty space, consider --pack", path.display());
        }
    }
    Ok(())
}

/// `r.<x>.<z>.<ext>` to its region position.
fn parse_region_name(name: &str) -> Option<RegionPos> {
    let mut parts = name.split('.');
    if parts.next()? != "r" {
        return None;
    }
    let x = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    parts.next()?;
    Some(RegionPos::new(x, z))
}
