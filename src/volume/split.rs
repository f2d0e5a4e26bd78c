//! Fixed-size splitting and joining of finished volumes.
//!
//! A sealed volume can be sliced into chunks named `<volume>.0`,
//! `<volume>.1`, … with every chunk the same size except a short tail.
//! Joining concatenates chunks in numeric-suffix order until a suffix is
//! missing. This layer only ever touches completed volumes; it knows
//! nothing about their contents.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::volume::{read_full, Progress};

/// I/O buffer for copying chunk data.
const COPY_BUF_SIZE: usize = 1 << 20;

/// Requested chunk sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitSize {
    /// Fixed chunk size in bytes; the last chunk may be short.
    Bytes(u64),
    /// Split into N chunks of equal size (the last may be short).
    Parts(u64),
}

impl SplitSize {
    /// Rejects zero sizes up front, before any output exists.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Bytes(0) => Err(Error::InvalidInput("split size must be positive".into())),
            Self::Parts(0) => Err(Error::InvalidInput("split part count must be positive".into())),
            _ => Ok(()),
        }
    }

    /// The chunk size in bytes for a volume of `total` bytes.
    fn chunk_bytes(&self, total: u64) -> u64 {
        match *self {
            Self::Bytes(bytes) => bytes,
            Self::Parts(parts) => total.div_ceil(parts).max(1),
        }
    }
}

/// Slices the volume at `path` into numbered chunks beside it. Returns the
/// chunk paths in order. Partially-written chunks are removed on failure.
pub fn split(path: &Path, size: &SplitSize, progress: &dyn Progress) -> Result<Vec<PathBuf>> {
    size.validate()?;
    let total = fs::metadata(path)?.len();
    let chunk_bytes = size.chunk_bytes(total);

    let mut reader = BufReader::new(File::open(path)?);
    let mut chunks = Vec::new();
    let result = split_inner(&mut reader, path, total, chunk_bytes, &mut chunks, progress);
    if result.is_err() {
        for chunk in &chunks {
            let _ = fs::remove_file(chunk);
        }
        return Err(result.unwrap_err());
    }

    debug!(chunks = chunks.len(), chunk_bytes, "volume split");
    Ok(chunks)
}

fn split_inner(
    reader: &mut BufReader<File>,
    path: &Path,
    total: u64,
    chunk_bytes: u64,
    chunks: &mut Vec<PathBuf>,
    progress: &dyn Progress,
) -> Result<()> {
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut remaining = total;
    let mut index = 0u64;

    while remaining > 0 {
        let chunk_path = numbered(path, index);
        let mut writer = BufWriter::new(File::create(&chunk_path)?);
        chunks.push(chunk_path);

        let mut left_in_chunk = chunk_bytes.min(remaining);
        while left_in_chunk > 0 {
            if progress.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let want = left_in_chunk.min(COPY_BUF_SIZE as u64) as usize;
            let n = read_full(reader, &mut buf[..want])?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "volume shrank during split")));
            }
            writer.write_all(&buf[..n])?;
            left_in_chunk -= n as u64;
            remaining -= n as u64;
        }
        writer.flush()?;
        index += 1;
        progress.set_progress(1.0 - remaining as f64 / total.max(1) as f64, "");
        progress.update();
    }

    Ok(())
}

/// Concatenates `<base>.0`, `<base>.1`, … into `dest`.
pub fn join(base: &Path, dest: &Path, progress: &dyn Progress) -> Result<()> {
    let mut writer = BufWriter::new(File::create(dest)?);
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut index = 0u64;

    loop {
        let chunk_path = numbered(base, index);
        let mut reader = match File::open(&chunk_path) {
            Ok(file) => BufReader::new(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => return Err(Error::Io(e)),
        };

        loop {
            if progress.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
        }
        index += 1;
        progress.update();
    }

    if index == 0 {
        return Err(Error::InvalidInput(format!("no split chunks found at {}.0", base.display())));
    }

    writer.flush()?;
    debug!(chunks = index, dest = %dest.display(), "split chunks recombined");
    Ok(())
}

/// `<path>.<index>`
fn numbered(path: &Path, index: u64) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use crate::volume::NullProgress;

    use super::*;

    #[test]
    fn split_then_join_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let volume = dir.path().join("data.pcv");
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
        fs::write(&volume, &payload).unwrap();

        let chunks = split(&volume, &SplitSize::Bytes(3000), &NullProgress).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(fs::metadata(&chunks[0]).unwrap().len(), 3000);
        assert_eq!(fs::metadata(&chunks[3]).unwrap().len(), 1000);

        let joined = dir.path().join("joined.pcv");
        join(&volume, &joined, &NullProgress).unwrap();
        assert_eq!(fs::read(&joined).unwrap(), payload);
    }

    #[test]
    fn parts_mode_divides_evenly() {
        let dir = tempfile::tempdir().unwrap();
        let volume = dir.path().join("data.pcv");
        fs::write(&volume, vec![9u8; 1001]).unwrap();

        let chunks = split(&volume, &SplitSize::Parts(4), &NullProgress).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(fs::metadata(&chunks[0]).unwrap().len(), 251);
        assert_eq!(fs::metadata(&chunks[3]).unwrap().len(), 248);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(SplitSize::Bytes(0).validate().is_err());
        assert!(SplitSize::Parts(0).validate().is_err());
        assert!(SplitSize::Bytes(1).validate().is_ok());
    }

    #[test]
    fn join_without_chunks_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("missing.pcv");
        let dest = dir.path().join("out");
        assert!(matches!(join(&base, &dest, &NullProgress), Err(Error::InvalidInput(_))));
    }
}
