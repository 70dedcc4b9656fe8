use img_hash::{HashAlg, HasherConfig};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{trace, warn};

/// DCT-based 64-bit perceptual hash, hex encoded. Returns `None` when the
/// file does not decode as an image, including when a decoder panics on
/// malformed input.
pub fn perceptual_hash(path: &Path) -> Option<String> {
    without_panics(path, || decode_and_hash(path))
}

fn without_panics(path: &Path, hash: impl FnOnce() -> Option<String>) -> Option<String> {
    match panic::catch_unwind(AssertUnwindSafe(hash)) {
        Ok(result) => result,
        Err(_) => {
            warn!("Image decoder panicked on {}", path.display());
            None
        }
    }
}

fn decode_and_hash(path: &Path) -> Option<String> {
    let img = match image::open(path) {
        Ok(img) => img,
        Err(e) => {
            trace!("No perceptual hash for {}: {}", path.display(), e);
            return None;
        }
    };
    let hasher = HasherConfig::new()
        .hash_size(8, 8)
        .hash_alg(HashAlg::Mean)
        .preproc_dct()
        .to_hasher();
    Some(hex::encode(hasher.hash_image(&img).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use tempfile::tempdir;

    fn write_gradient_png(path: &Path, shift: u8) {
        let buffer = ImageBuffer::from_fn(32, 32, |x, y| {
            Rgb([(x * 8) as u8, (y * 8) as u8, shift])
        });
        DynamicImage::ImageRgb8(buffer).save(path).unwrap();
    }

    #[test]
    fn test_image_gets_hash() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("gradient.png");
        write_gradient_png(&path, 0);

        let hash = perceptual_hash(&path).unwrap();
        assert_eq!(hash.len(), 16);
    }

    #[test]
    fn test_same_image_same_hash() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a.png");
        let b = tmp.path().join("b.png");
        write_gradient_png(&a, 10);
        write_gradient_png(&b, 10);
        assert_eq!(perceptual_hash(&a), perceptual_hash(&b));
    }

    #[test]
    fn test_decoder_panic_yields_no_hash() {
        let result = without_panics(Path::new("bad.jpg"), || panic!("corrupt huffman table"));
        assert!(result.is_none());
    }

    #[test]
    fn test_guard_passes_result_through() {
        let result = without_panics(Path::new("ok.jpg"), || Some("ab".to_string()));
        assert_eq!(result.as_deref(), Some("ab"));
    }

    #[test]
    fn test_garbage_with_image_extension_is_absent() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(perceptual_hash(&path).is_none());
    }
}
