//! Test utilities for integration tests.
//!
//! Fixture images are generated with the `image` crate into temporary
//! directories. [`RecordingProcessor`] wraps the native processor, counts
//! every capability call and can be told to fail one of them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use pyramid_tiler::{
    BackgroundColor, Canvas, Gravity, ImageProcessor, ProcessorError, RasterProcessor, TileFormat,
    TilerConfig, Tiling,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Source and working directories of one test.
pub struct TestDirs {
    _temp: TempDir,
    pub source: PathBuf,
    pub work: PathBuf,
    pub out: PathBuf,
}

impl TestDirs {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let work = temp.path().join("work");
        let out = temp.path().join("out");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&work).unwrap();
        TestDirs {
            _temp: temp,
            source,
            work,
            out,
        }
    }

    /// Write a gradient fixture image into the source directory.
    pub fn image(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.source.join(name);
        create_gradient_image(&path, width, height);
        path
    }
}

/// Write an RGB gradient, so scaled and cropped pieces differ visibly.
pub fn create_gradient_image(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    img.save(path).unwrap();
}

/// Conversion settings with square tiles of `tile` pixels.
pub fn test_config(work: &Path, tile: u32, format: TileFormat) -> TilerConfig {
    TilerConfig::new(work)
        .with_tile_size(tile, tile)
        .with_format(format)
        .with_quality(90)
        .with_background(BackgroundColor::WHITE)
}

/// Names of the entries directly inside `dir`, sorted.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Number of regular files below `dir`, recursively.
pub fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .map(|p| if p.is_dir() { count_files(&p) } else { 1 })
        .sum()
}

// =============================================================================
// Recording Processor
// =============================================================================

/// Capability operations, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Identify,
    Crop,
    Resize,
    Montage,
    Scale,
    Assemble,
}

impl Op {
    fn index(self) -> usize {
        self as usize
    }
}

/// Processor wrapper that counts calls and can fail the n-th call of one
/// operation.
pub struct RecordingProcessor {
    inner: RasterProcessor,
    calls: [AtomicUsize; 6],
    fail_on: Option<(Op, usize)>,
}

impl RecordingProcessor {
    pub fn new(config: &TilerConfig) -> Self {
        RecordingProcessor {
            inner: RasterProcessor::new(config),
            calls: Default::default(),
            fail_on: None,
        }
    }

    /// Fail the `nth` (1-based) call of `op`.
    pub fn failing_on(mut self, op: Op, nth: usize) -> Self {
        self.fail_on = Some((op, nth));
        self
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    fn record(&self, op: Op, target: &Path) -> Result<(), ProcessorError> {
        let n = self.calls[op.index()].fetch_add(1, Ordering::SeqCst) + 1;
        match self.fail_on {
            Some((fail_op, nth)) if fail_op == op && nth == n => Err(ProcessorError::Encode {
                path: target.to_path_buf(),
                message: format!("injected failure on {:?} #{}", op, n),
            }),
            _ => Ok(()),
        }
    }
}

impl ImageProcessor for RecordingProcessor {
    fn identify(&self, src: &Path) -> Result<(u32, u32), ProcessorError> {
        self.record(Op::Identify, src)?;
        self.inner.identify(src)
    }

    fn crop(
        &self,
        src: &Path,
        target_pattern: &Path,
        width: u32,
        height: u32,
        canvas: Option<&Canvas>,
    ) -> Result<usize, ProcessorError> {
        self.record(Op::Crop, target_pattern)?;
        self.inner.crop(src, target_pattern, width, height, canvas)
    }

    fn resize(
        &self,
        src: &Path,
        target: &Path,
        width: u32,
        height: u32,
    ) -> Result<(), ProcessorError> {
        self.record(Op::Resize, target)?;
        self.inner.resize(src, target, width, height)
    }

    fn montage(
        &self,
        sources: &[PathBuf],
        target: &Path,
        tiling: Tiling,
        gravity: Option<Gravity>,
        background: Option<BackgroundColor>,
    ) -> Result<(), ProcessorError> {
        self.record(Op::Montage, target)?;
        self.inner.montage(sources, target, tiling, gravity, background)
    }

    fn scale(
        &self,
        src: &Path,
        target: &Path,
        width: u32,
        height: u32,
    ) -> Result<(), ProcessorError> {
        self.record(Op::Scale, target)?;
        self.inner.scale(src, target, width, height)
    }

    fn assemble_pyramid(
        &self,
        levels: &[PathBuf],
        target: &Path,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<(), ProcessorError> {
        self.record(Op::Assemble, target)?;
        self.inner
            .assemble_pyramid(levels, target, tile_width, tile_height)
    }
}
