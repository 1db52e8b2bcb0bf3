//! Replays still images from a directory as compressed preview frames

use std::path::{Path, PathBuf};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use tracing::{info, instrument};

use super::frame::{FrameBuffer, PixelFormat};

const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Cycles through the images of a directory in file name order
pub struct ReplaySource {
    files: Vec<PathBuf>,
    cursor: usize,
    sequence: u64,
}

impl ReplaySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .wrap_err_with(|| format!("Failed to read replay directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_still_image(path))
            .collect();

        if files.is_empty() {
            return Err(eyre!("No .jpg/.jpeg/.png files in {}", dir.display()));
        }
        files.sort();

        info!("Replaying {} image(s) from {}", files.len(), dir.display());
        Ok(Self {
            files,
            cursor: 0,
            sequence: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Reads the next file, wrapping around at the end.
    #[instrument(skip(self))]
    pub fn next_frame(&mut self) -> Result<FrameBuffer> {
        let path = &self.files[self.cursor];
        self.cursor = (self.cursor + 1) % self.files.len();

        let data = std::fs::read(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        // Header-only probe; an unreadable header still goes to the decoder
        let (width, height) = image::image_dimensions(path).unwrap_or((0, 0));

        self.sequence += 1;
        Ok(FrameBuffer::new(data, PixelFormat::Compressed, width, height).with_sequence(self.sequence))
    }
}

fn is_still_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn write_png(dir: &Path, name: &str, width: u32) {
        RgbImage::new(width, 2).save(dir.join(name)).unwrap();
    }

    #[test]
    fn cycles_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 3);
        write_png(dir.path(), "a.png", 5);
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ReplaySource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);

        let widths: Vec<_> = (0..3)
            .map(|_| source.next_frame().unwrap())
            .map(|f| (f.meta.sequence, f.meta.width, f.meta.format))
            .collect();
        assert_eq!(
            widths,
            vec![
                (1, 5, PixelFormat::Compressed),
                (2, 3, PixelFormat::Compressed),
                (3, 5, PixelFormat::Compressed),
            ]
        );
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReplaySource::open(dir.path()).is_err());
    }
}
