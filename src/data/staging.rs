use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

const PARTIAL_SUFFIX: &str = "partial";

/// Name of the staged copy of `source`; a `.gz` suffix is dropped
pub fn staged_file_name(source: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::UnsupportedConfiguration(format!("Invalid source file name: {:?}", source))
        })?;

    Ok(PathBuf::from(name.strip_suffix(".gz").unwrap_or(name)))
}

/// Make sure `source` has a complete copy inside `staging_dir` and return its path.
///
/// The copy is written to a `.partial` file and renamed once complete, so an
/// interrupted run never leaves something that looks staged. Gzipped sources
/// are decompressed on the way. Calling this again with a staged file present
/// does nothing.
pub fn ensure_staged<P: AsRef<Path>, Q: AsRef<Path>>(source: P, staging_dir: Q) -> Result<PathBuf> {
    let source = source.as_ref();
    let staging_dir = staging_dir.as_ref();

    let staged = staging_dir.join(staged_file_name(source)?);
    if staged.is_file() {
        debug!("Already staged: {:?}", staged);
        return Ok(staged);
    }

    if !source.is_file() {
        return Err(Error::FileNotFound(source.to_path_buf()));
    }

    fs::create_dir_all(staging_dir)?;

    let partial = staged.with_extension(match staged.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", ext, PARTIAL_SUFFIX),
        None => PARTIAL_SUFFIX.to_string(),
    });

    info!("Copying the data in {:?}...", staged);
    let start = Instant::now();

    let bytes = copy_source(source, &partial).map_err(|e| {
        fs::remove_file(&partial).ok();
        e
    })?;
    fs::rename(&partial, &staged)?;

    info!(
        "Staged {} bytes in {:.2}s",
        bytes,
        start.elapsed().as_secs_f64()
    );
    Ok(staged)
}

fn copy_source(source: &Path, destination: &Path) -> Result<u64> {
    let mut writer = BufWriter::new(File::create(destination)?);
    let reader = BufReader::new(File::open(source)?);

    let bytes = if is_gzipped(source) {
        io::copy(&mut GzDecoder::new(reader), &mut writer)?
    } else {
        let mut reader = reader;
        io::copy(&mut reader, &mut writer)?
    };

    writer.flush()?;
    Ok(bytes)
}

pub fn is_gzipped(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}
