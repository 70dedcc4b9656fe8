pub mod content;
pub mod perceptual;

use std::io;
use std::path::Path;

/// Fingerprints of a single file. `perceptual` is absent for anything that
/// does not decode as an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub content: String,
    pub perceptual: Option<String>,
}

/// Compute both fingerprints for one file. Only the content hash can fail;
/// the caller decides whether that skips the file.
pub fn fingerprint(path: &Path) -> io::Result<Fingerprint> {
    let content = content::content_hash(path)?;
    let perceptual = perceptual::perceptual_hash(path);
    Ok(Fingerprint {
        content,
        perceptual,
    })
}
