use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::records::{InputFormat, is_header_line};
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::{Builder, NamedTempFile};

/// Runs `write_fn` against the sink named by `path`: `-` is stdout, a
/// `.gz` suffix gzip-compresses, anything else is a plain file.
pub fn with_text_output_writer<F>(path: &str, write_fn: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    if path == "-" {
        let mut out = stdout().lock();
        write_fn(&mut out)?;
        out.flush()?;
        return Ok(());
    }

    if path.ends_with(".gz") {
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_fn(&mut encoder)?;
        encoder.finish()?.flush()?;
        return Ok(());
    }

    let mut file = BufWriter::new(File::create(path)?);
    write_fn(&mut file)?;
    file.flush()?;
    Ok(())
}

/// Whether `output` names the file at `input`, after resolving `.`/`..`
/// components and symlinks. An output that does not exist yet is resolved
/// through its parent directory.
pub fn is_same_file(input: &str, output: &str) -> bool {
    if output == "-" {
        return false;
    }
    match (fs::canonicalize(input), resolve_output_path(output)) {
        (Ok(input), Some(output)) => input == output,
        _ => input == output,
    }
}

fn resolve_output_path(output: &str) -> Option<PathBuf> {
    let path = Path::new(output);
    if let Ok(resolved) = fs::canonicalize(path) {
        return Some(resolved);
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path.file_name()?;
    fs::canonicalize(parent).ok().map(|dir| dir.join(name))
}

/// Replays `input` and writes headers plus every data line whose flag is
/// set, preserving order. Returns the number of data lines written.
pub fn write_filtered_records<R: BufRead>(
    input: R,
    format: InputFormat,
    keep: &[bool],
    out: &mut dyn Write,
) -> Result<usize> {
    let mut data_index = 0usize;
    let mut written = 0usize;

    for (line_index, line) in input.lines().enumerate() {
        let line = line?;
        if is_header_line(format, line_index, &line) {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
            continue;
        }
        if keep.get(data_index).copied().unwrap_or(false) {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
            written += 1;
        }
        data_index += 1;
    }

    Ok(written)
}

/// Writes `bytes` to a temporary file next to `output`, then moves it
/// into place.
pub fn write_bytes_atomically(output: &str, bytes: &[u8]) -> Result<()> {
    let output_path = Path::new(output);
    let parent_dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = Builder::new()
        .prefix("covnorm_")
        .suffix(".tmp_profile")
        .tempfile_in(parent_dir)?;
    staged.as_file_mut().write_all(bytes)?;
    staged.as_file_mut().flush()?;
    persist_tempfile_to_path(staged, output)
}

fn persist_tempfile_to_path(staged: NamedTempFile, output: &str) -> Result<()> {
    match staged.persist(output) {
        Ok(_) => Ok(()),
        Err(error) => {
            let file = error.file;
            let mut input = File::open(file.path())?;
            let mut out = BufWriter::new(File::create(output)?);
            std::io::copy(&mut input, &mut out)?;
            out.flush()?;
            fs::remove_file(file.path())?;
            Ok(())
        }
    }
}
