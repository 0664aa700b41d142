//! Thin wrappers around the SRA toolkit used to obtain the reads that the pipeline later
//! quantifies. The tools do all the real work; these helpers only build the command lines,
//! check exit status, and do the post-processing (gzip in place, archive cleanup).

use crate::error::FetchError;
use crate::options::FetchOptions;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

fn run_tool(tool: &str, cmd: &mut Command) -> Result<(), FetchError> {
    debug!("running {:?}", cmd);
    let status = cmd.status().map_err(|source| FetchError::ToolLaunch {
        tool: tool.to_string(),
        source,
    })?;
    if !status.success() {
        return Err(FetchError::ToolFailed {
            tool: tool.to_string(),
            status,
        });
    }
    Ok(())
}

/// Downloads the SRA archive of `accession` into `outdir` with `prefetch`.
pub fn prefetch<T: AsRef<Path>>(
    accession: &str,
    outdir: T,
    opts: &FetchOptions,
) -> Result<(), FetchError> {
    let outdir = outdir.as_ref();
    info!("prefetching {} into {:?}", accession, outdir);
    run_tool(
        &opts.prefetch_bin,
        Command::new(&opts.prefetch_bin)
            .arg(accession)
            .arg("-O")
            .arg(outdir),
    )
}

/// The accession an archive was downloaded for: its file name without the `.sra` extension.
pub fn accession_from_archive<T: AsRef<Path>>(archive: T) -> String {
    let name = archive
        .as_ref()
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".sra") {
        Some(acc) => acc.to_string(),
        None => name,
    }
}

/// Compresses `path` to `path.gz` and removes `path` once the compressed copy is complete.
pub fn gzip_in_place<T: AsRef<Path>>(path: T) -> Result<PathBuf, FetchError> {
    let path = path.as_ref();
    let mut gz_name = path.as_os_str().to_os_string();
    gz_name.push(".gz");
    let gz_path = PathBuf::from(gz_name);

    let mut rdr = BufReader::new(File::open(path)?);
    let wtr = BufWriter::new(File::create(&gz_path)?);
    let mut encoder = GzEncoder::new(wtr, Compression::best());
    let written = io::copy(&mut rdr, &mut encoder)
        .and_then(|_| encoder.finish())
        .and_then(|mut w| w.flush());
    if let Err(e) = written {
        // the plain file is untouched; drop the incomplete archive
        let _ = fs::remove_file(&gz_path);
        return Err(e.into());
    }

    fs::remove_file(path)?;
    debug!("compressed {:?} to {:?}", path, gz_path);
    Ok(gz_path)
}

/// Gzips whichever of `<accession>.fastq`, `<accession>_1.fastq` and `<accession>_2.fastq`
/// exist in `outdir`, returning the compressed paths in that order.
pub fn compress_fastqs<T: AsRef<Path>>(
    accession: &str,
    outdir: T,
) -> Result<Vec<PathBuf>, FetchError> {
    let outdir = outdir.as_ref();
    let candidates = [
        format!("{}.fastq", accession),
        format!("{}_1.fastq", accession),
        format!("{}_2.fastq", accession),
    ];

    let mut compressed = Vec::with_capacity(2);
    for name in candidates.iter() {
        let fq = outdir.join(name);
        if fq.exists() {
            compressed.push(gzip_in_place(&fq)?);
        }
    }
    if compressed.is_empty() {
        warn!("no FASTQ files for {} were found in {:?}", accession, outdir);
    }
    Ok(compressed)
}

/// Extracts FASTQ files from `archive` into `outdir` with `fasterq-dump`, gzips them, and
/// removes the archive.
///
/// The FASTQ content is not checked before the archive is deleted. If the extraction tool
/// fails, nothing is compressed or removed.
pub fn dump_fastq<T: AsRef<Path>, U: AsRef<Path>>(
    archive: T,
    outdir: U,
    opts: &FetchOptions,
) -> Result<Vec<PathBuf>, FetchError> {
    let archive = archive.as_ref();
    let outdir = outdir.as_ref();
    info!("extracting FASTQ from {:?} into {:?}", archive, outdir);
    run_tool(
        &opts.fasterq_bin,
        Command::new(&opts.fasterq_bin)
            .arg("-O")
            .arg(outdir)
            .arg(archive),
    )?;

    let accession = accession_from_archive(archive);
    let compressed = compress_fastqs(&accession, outdir)?;

    fs::remove_file(archive)?;
    info!(
        "compressed {} FASTQ file(s) for {} and removed {:?}",
        compressed.len(),
        accession,
        archive
    );
    Ok(compressed)
}
