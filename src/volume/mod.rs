//! Volume operations: the public encrypt/decrypt API.
//!
//! An operation consumes one plaintext byte stream and produces one
//! ciphertext byte stream (or the reverse). Everything around that, such as
//! the archive packer for multiple inputs, chunk splitting, and the
//! interactive UI, is a thin collaborator layered on top of these two entry
//! points.

use std::io::Read;
use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::error::Result;

pub mod context;
pub mod decrypt;
pub mod deniability;
pub mod encrypt;
pub mod split;

pub use decrypt::{decrypt, DecryptOutcome};
pub use encrypt::encrypt;
pub use split::SplitSize;

/// Progress and cancellation interface the pipelines report through.
///
/// Implementations must be cheap to call: the stream loops invoke
/// [`Progress::update`] and [`Progress::is_cancelled`] once per 1 MiB chunk.
pub trait Progress {
    /// Replaces the one-line status text (phase descriptions).
    fn set_status(&self, status: &str);
    /// Updates the completion fraction (0.0 ..= 1.0) and detail text.
    fn set_progress(&self, fraction: f64, info: &str);
    /// Signals whether the current phase can be safely cancelled.
    fn set_can_cancel(&self, can_cancel: bool);
    /// Flushes pending display state.
    fn update(&self);
    /// Polled at every suspension point; true aborts the operation.
    fn is_cancelled(&self) -> bool;
}

/// No-op reporter for headless and test use.
pub struct NullProgress;

impl Progress for NullProgress {
    fn set_status(&self, _status: &str) {}
    fn set_progress(&self, _fraction: f64, _info: &str) {}
    fn set_can_cancel(&self, _can_cancel: bool) {}
    fn update(&self) {}
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Parameters for sealing one volume.
pub struct EncryptRequest {
    /// The plaintext input. Combining several inputs into one stream is the
    /// external packer's job.
    pub input: PathBuf,
    /// Final volume path. Data is written to `<output>.incomplete` and
    /// renamed only after the auth fields are patched in.
    pub output: PathBuf,
    /// May be empty when keyfiles are supplied.
    pub password: SecretString,
    pub keyfiles: Vec<PathBuf>,
    /// Hash keyfiles as an ordered chain instead of an XOR fold.
    pub ordered_keyfiles: bool,
    /// Plaintext header comments, at most 99999 bytes.
    pub comments: String,
    pub paranoid: bool,
    /// Expand payload sub-blocks with Reed-Solomon parity.
    pub payload_rs: bool,
    /// Wrap the finished volume in the deniability layer.
    pub deniability: bool,
    /// Slice the finished volume into fixed-size chunks.
    pub split: Option<SplitSize>,
}

/// Parameters for opening one volume.
pub struct DecryptRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub password: SecretString,
    pub keyfiles: Vec<PathBuf>,
    /// Keep going on damage and MAC failure, keeping best-effort output.
    /// Never overrides a wrong password or wrong keyfiles.
    pub force: bool,
    /// Join `<input>.0`, `<input>.1`, … before reading.
    pub recombine: bool,
    /// Strip the deniability layer before reading. Auto-detected when the
    /// version field does not decode either way.
    pub deniability: bool,
}

/// Appends the in-progress suffix to an output path.
#[must_use]
pub(crate) fn incomplete_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".incomplete");
    PathBuf::from(name)
}

/// Appends the intermediate-file suffix to an input path.
#[must_use]
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Fills `buf` as far as the stream allows, tolerating short reads. Returns
/// the number of bytes read; less than `buf.len()` only at end of stream.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Shared check used by both pipelines at every suspension point.
pub(crate) fn check_cancelled(progress: &dyn Progress) -> Result<()> {
    if progress.is_cancelled() {
        Err(crate::error::Error::Cancelled)
    } else {
        Ok(())
    }
}
