//! Stripes: the unit of work of the pyramid builder.
//!
//! A stripe is a full-width (horizontal) or full-height (vertical) slice of
//! the image at one pyramid level, stored as a file in the [`Workspace`].
//! Each coarser level is built by joining neighbouring stripes pairwise and
//! halving the result, so only two stripes are ever decoded at once.
//!
//! ```text
//!   level i            level i+1
//! ┌──────────┐
//! │ stripe 0 │──┐    ┌──────────┐
//! ├──────────┤  ├──▶ │ merge    │   join + scale 50%
//! │ stripe 1 │──┘    ├──────────┤
//! ├──────────┤       │ shrink   │   scale 50% (no partner)
//! │ stripe 2 │─────▶ └──────────┘
//! └──────────┘
//! ```
//!
//! Every operation returns a new [`Stripe`]; inputs are never modified.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::BackgroundColor;
use crate::error::TilingError;
use crate::processor::{ensure_output, pattern_path, Canvas, Gravity, ImageProcessor, Tiling};
use crate::workspace::Workspace;

// =============================================================================
// Stripe
// =============================================================================

/// Direction in which a stripe spans the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Full-width band; stripes stack top to bottom
    Horizontal,
    /// Full-height band; stripes sit left to right
    Vertical,
}

impl Orientation {
    /// Grid that joins two stripes of this orientation.
    pub fn pair_tiling(self) -> Tiling {
        match self {
            Orientation::Horizontal => Tiling::vertical(2),
            Orientation::Vertical => Tiling::horizontal(2),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Horizontal => write!(f, "horizontal"),
            Orientation::Vertical => write!(f, "vertical"),
        }
    }
}

/// One slice of the image at one pyramid level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripe {
    path: PathBuf,
    width: u32,
    height: u32,
    orientation: Orientation,
}

impl Stripe {
    /// Describe an existing stripe file.
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32, orientation: Orientation) -> Self {
        Stripe {
            path: path.into(),
            width,
            height,
            orientation,
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Stripe orientation.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }
}

/// Half of a dimension, rounding up.
#[inline]
fn half(value: u32) -> u32 {
    value.div_ceil(2).max(1)
}

// =============================================================================
// StripeManager
// =============================================================================

/// Creates, joins, shrinks and deletes stripes for one conversion.
pub struct StripeManager<'a> {
    processor: &'a dyn ImageProcessor,
    workspace: &'a Workspace,
    background: BackgroundColor,
}

impl<'a> StripeManager<'a> {
    /// Create a manager writing into `workspace`.
    pub fn new(
        processor: &'a dyn ImageProcessor,
        workspace: &'a Workspace,
        background: BackgroundColor,
    ) -> Self {
        StripeManager {
            processor,
            workspace,
            background,
        }
    }

    /// Cut `image` into stripes of `width` x `height`.
    ///
    /// With a canvas, every stripe is padded to the canvas size. The last
    /// stripe's size is always measured from the produced file, since it may
    /// be truncated.
    pub fn stripe_image(
        &self,
        image: &Path,
        orientation: Orientation,
        width: u32,
        height: u32,
        canvas: Option<&Canvas>,
        label: &str,
    ) -> Result<Vec<Stripe>, TilingError> {
        let pattern = self.workspace.artifact_pattern(label);
        let count = self
            .processor
            .crop(image, &pattern, width, height, canvas)?;
        if count == 0 {
            return Err(TilingError::processing(
                "stripe",
                format!("no stripes cut from {}", image.display()),
            ));
        }

        let mut stripes = Vec::with_capacity(count);
        for i in 0..count {
            let path = pattern_path(&pattern, i);
            self.workspace.track(&path);
            ensure_output(&path)?;

            let (w, h) = if i + 1 == count {
                self.processor.identify(&path)?
            } else {
                canvas.map(Canvas::size).unwrap_or((width, height))
            };
            stripes.push(Stripe::new(path, w, h, orientation));
        }

        debug!(
            "Cut {} into {} {} stripes",
            image.display(),
            stripes.len(),
            orientation
        );
        Ok(stripes)
    }

    /// Downsample one stripe by half in both axes.
    ///
    /// Used for the unpaired stripe of an odd-sized level. With a canvas, the
    /// result is padded to the canvas size, which stands in for the missing
    /// partner.
    pub fn shrink(
        &self,
        stripe: &Stripe,
        canvas: Option<&Canvas>,
        label: &str,
    ) -> Result<Stripe, TilingError> {
        let target = self.workspace.artifact_path(label);
        self.workspace.track(&target);

        self.processor.scale(
            stripe.path(),
            &target,
            half(stripe.width()),
            half(stripe.height()),
        )?;
        debug!("Shrunk {} to {}", stripe.path().display(), target.display());

        self.finish(target, canvas, label, stripe.orientation())
    }

    /// Join two stripes along their stacking axis and downsample by half.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::OrientationMismatch`] if the stripes differ in
    /// orientation.
    pub fn merge(
        &self,
        first: &Stripe,
        second: &Stripe,
        canvas: Option<&Canvas>,
        label: &str,
    ) -> Result<Stripe, TilingError> {
        if first.orientation() != second.orientation() {
            return Err(TilingError::OrientationMismatch {
                left: first.orientation().to_string(),
                right: second.orientation().to_string(),
            });
        }
        let orientation = first.orientation();

        let joined = self.workspace.artifact_path(&format!("{}-joined", label));
        self.workspace.track(&joined);
        self.processor.montage(
            &[first.path().to_path_buf(), second.path().to_path_buf()],
            &joined,
            orientation.pair_tiling(),
            Some(Gravity::NorthWest),
            Some(self.background),
        )?;

        let (joined_w, joined_h) = match orientation {
            Orientation::Horizontal => (
                first.width().max(second.width()),
                first.height() + second.height(),
            ),
            Orientation::Vertical => (
                first.width() + second.width(),
                first.height().max(second.height()),
            ),
        };

        let target = self.workspace.artifact_path(label);
        self.workspace.track(&target);
        self.processor
            .scale(&joined, &target, half(joined_w), half(joined_h))?;
        self.discard(&joined);
        debug!(
            "Merged {} and {} into {}",
            first.path().display(),
            second.path().display(),
            target.display()
        );

        self.finish(target, canvas, label, orientation)
    }

    /// Remove a stripe's backing file.
    pub fn delete(&self, stripe: &Stripe) -> Result<(), TilingError> {
        self.workspace.discard(stripe.path())
    }

    /// Build the stripes of the next coarser level.
    ///
    /// Neighbours are merged pairwise; an odd last stripe is shrunk alone.
    /// The input stripes are left in place.
    pub fn next_level(
        &self,
        stripes: &[Stripe],
        canvas: Option<&Canvas>,
        level: usize,
    ) -> Result<Vec<Stripe>, TilingError> {
        stripes
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| {
                let label = format!("{}-{}", level, i);
                match pair {
                    [first, second] => self.merge(first, second, canvas, &label),
                    _ => self.shrink(&pair[0], canvas, &label),
                }
            })
            .collect()
    }

    /// Delete stripes a later level no longer needs.
    ///
    /// Failures are logged and counted, never propagated.
    pub fn release(&self, stripes: &[Stripe]) -> usize {
        let mut failures = 0;
        for stripe in stripes {
            if let Err(e) = self.delete(stripe) {
                warn!("{}", e);
                failures += 1;
            }
        }
        failures
    }

    /// Apply the optional canvas and measure the result.
    fn finish(
        &self,
        scaled: PathBuf,
        canvas: Option<&Canvas>,
        label: &str,
        orientation: Orientation,
    ) -> Result<Stripe, TilingError> {
        let Some(canvas) = canvas else {
            let (w, h) = self.processor.identify(&scaled)?;
            return Ok(Stripe::new(scaled, w, h, orientation));
        };

        let (w, h) = self.processor.identify(&scaled)?;
        let pattern = self.workspace.artifact_pattern(&format!("{}-canvas", label));
        let padded = pattern_path(&pattern, 0);
        self.workspace.track(&padded);

        self.processor.crop(&scaled, &pattern, w, h, Some(canvas))?;
        ensure_output(&padded)?;
        self.discard(&scaled);

        Ok(Stripe::new(padded, canvas.width, canvas.height, orientation))
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = self.workspace.discard(path) {
            warn!("{}", e);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
