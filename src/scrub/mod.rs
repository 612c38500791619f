//! Gzip header scrubbing
//!
//! Exported gzip members often carry the original filename and a
//! modification time in their header, which leaks acquisition details and
//! breaks byte-identical comparisons. Scrubbing zeroes MTIME and drops the
//! FNAME field without touching the compressed payload; a header CRC is
//! dropped too since the header it covered has changed. FEXTRA and
//! FCOMMENT fields are preserved as-is.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::config::{DatasetFilter, RunConfig};
use crate::output::{OpSummary, Reporter};

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;

/// Malformed gzip member diagnostics
#[derive(Debug, Error)]
pub enum ScrubError {
    #[error("not a gzip member")]
    NotGzip,
    #[error("truncated {field} field")]
    Truncated { field: &'static str },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Byte layout of one leading gzip member header.
#[derive(Debug, Clone)]
struct HeaderMeta {
    fixed: [u8; 10],
    flags: u8,
    mtime: u32,
    /// Offset span of the FEXTRA length+payload, when present.
    extra: Option<(u64, u64)>,
    /// Offset span of the FCOMMENT string including its NUL, when present.
    fcomment: Option<(u64, u64)>,
    /// Offset of the two FHCRC bytes, when present.
    fhcrc_offset: Option<u64>,
    /// Offset where the compressed payload starts.
    payload_start: u64,
}

impl HeaderMeta {
    const fn needs_scrub(&self) -> bool {
        self.mtime != 0 || self.flags & FNAME != 0
    }

    fn dirty_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.mtime != 0 {
            fields.push(format!("MTIME={}", self.mtime));
        }
        if self.flags & FNAME != 0 {
            fields.push("FNAME".to_string());
        }
        if self.flags & FHCRC != 0 {
            fields.push("FHCRC(removal)".to_string());
        }
        fields
    }
}

fn read_nul_terminated(
    reader: &mut impl Read,
    offset: &mut u64,
    field: &'static str,
) -> Result<(), ScrubError> {
    let mut byte = [0u8; 1];
    loop {
        if reader.read(&mut byte)? == 0 {
            return Err(ScrubError::Truncated { field });
        }
        *offset += 1;
        if byte[0] == 0 {
            return Ok(());
        }
    }
}

/// Parse the leading member header at the reader's current position.
fn parse_header(reader: &mut (impl Read + Seek)) -> Result<HeaderMeta, ScrubError> {
    let mut fixed = [0u8; 10];
    reader
        .read_exact(&mut fixed)
        .map_err(|_| ScrubError::NotGzip)?;
    if fixed[..2] != [0x1f, 0x8b] || fixed[2] != 0x08 {
        return Err(ScrubError::NotGzip);
    }
    let flags = fixed[3];
    let mtime = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
    let mut offset = 10u64;

    let mut extra = None;
    if flags & FEXTRA != 0 {
        let start = offset;
        let mut len_bytes = [0u8; 2];
        reader
            .read_exact(&mut len_bytes)
            .map_err(|_| ScrubError::Truncated { field: "FEXTRA" })?;
        let extra_len = u64::from(u16::from_le_bytes(len_bytes));
        offset += 2 + extra_len;
        reader.seek(SeekFrom::Current(extra_len as i64))?;
        extra = Some((start, offset));
    }

    if flags & FNAME != 0 {
        read_nul_terminated(reader, &mut offset, "FNAME")?;
    }

    let mut fcomment = None;
    if flags & FCOMMENT != 0 {
        let start = offset;
        read_nul_terminated(reader, &mut offset, "FCOMMENT")?;
        fcomment = Some((start, offset));
    }

    let mut fhcrc_offset = None;
    if flags & FHCRC != 0 {
        fhcrc_offset = Some(offset);
        offset += 2;
        reader.seek(SeekFrom::Current(2))?;
    }

    Ok(HeaderMeta {
        fixed,
        flags,
        mtime,
        extra,
        fcomment,
        fhcrc_offset,
        payload_start: offset,
    })
}

fn copy_span(
    reader: &mut (impl Read + Seek),
    writer: &mut impl Write,
    span: (u64, u64),
) -> io::Result<()> {
    reader.seek(SeekFrom::Start(span.0))?;
    let mut taken = reader.take(span.1 - span.0);
    io::copy(&mut taken, writer)?;
    Ok(())
}

/// Write a clean header (MTIME=0, no FNAME, no FHCRC) followed by the
/// untouched payload.
fn rewrite(
    reader: &mut (impl Read + Seek),
    writer: &mut impl Write,
    meta: &HeaderMeta,
) -> io::Result<()> {
    let mut new_flags = meta.flags & !FNAME;
    new_flags &= !FHCRC;

    let mut fixed = meta.fixed;
    fixed[3] = new_flags;
    fixed[4..8].copy_from_slice(&[0, 0, 0, 0]);
    writer.write_all(&fixed)?;

    if let Some(span) = meta.extra {
        copy_span(reader, writer, span)?;
    }
    if let Some(span) = meta.fcomment {
        copy_span(reader, writer, span)?;
    }

    let payload_from = match meta.fhcrc_offset {
        Some(offset) => offset + 2,
        None => meta.payload_start,
    };
    reader.seek(SeekFrom::Start(payload_from))?;
    io::copy(reader, writer)?;
    Ok(())
}

/// Scrub one file in place via a sibling temp file and atomic replace.
///
/// # Errors
/// Propagates header parse failures and filesystem errors.
pub fn scrub_file(path: &Path) -> Result<(), ScrubError> {
    let mut input = File::open(path)?;
    let meta = parse_header(&mut input)?;

    let temp_path = scratch_path(path);
    let result = (|| -> Result<(), ScrubError> {
        let mut output = File::create(&temp_path)?;
        rewrite(&mut input, &mut output, &meta)?;
        output.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn scratch_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("scrub");
    path.with_file_name(format!("{name}.tmp"))
}

/// Scrub every `*.gz` file under the root that matches the dataset filter.
/// Already-clean files count as skips.
///
/// # Errors
/// Returns `crate::BidsmanError::InvalidInput` when the root does not
/// exist; per-file failures are recorded in the summary.
pub fn scrub_tree(
    root: &Path,
    filter: &DatasetFilter,
    config: RunConfig,
) -> Result<OpSummary, crate::BidsmanError> {
    if !root.is_dir() {
        return Err(crate::BidsmanError::InvalidInput(format!(
            "Directory not found: {}",
            root.display()
        )));
    }

    let reporter = Reporter::new(config.verbose, config.dry_run);
    let mut summary = OpSummary::new();

    let targets: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().is_some_and(|n| n.ends_with(".gz")))
        .filter(|e| {
            e.path()
                .strip_prefix(root)
                .is_ok_and(|relative| filter.matches(relative))
        })
        .map(|e| e.into_path())
        .collect();

    if targets.is_empty() {
        reporter.info("No *.gz files found");
        return Ok(summary);
    }

    for path in targets {
        let meta = match File::open(&path).map_err(ScrubError::from).and_then(|mut f| {
            parse_header(&mut f)
        }) {
            Ok(meta) => meta,
            Err(err) => {
                reporter.error(format!("{}: {err}", path.display()));
                summary.add_error(path, err.to_string());
                continue;
            }
        };

        if !meta.needs_scrub() {
            summary.add_skip(path, "header already clean");
            continue;
        }

        let fields = meta.dirty_fields().join(", ");
        if reporter.is_dry_run() {
            reporter.info(format!("Would scrub {} ({fields})", path.display()));
            summary.add_processed();
            continue;
        }

        match scrub_file(&path) {
            Ok(()) => {
                reporter.info(format!("Scrubbed {} ({fields})", path.display()));
                summary.add_processed();
            }
            Err(err) => {
                reporter.error(format!("{}: {err}", path.display()));
                summary.add_error(path, err.to_string());
            }
        }
    }

    Ok(summary)
}
