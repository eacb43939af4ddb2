//! Gesture template: one recorded sequence of observation frames.

use crate::{Error, Result};
use nalgebra::DVector;

/// A recorded gesture.
///
/// Frames are stored relative to the first frame pushed, so frame 0 is always
/// the origin. The template also tracks the per-dimension minimum and maximum
/// of its relative frames; once the template joins a [`TemplateStore`], those
/// ranges are overwritten with the ranges of the whole vocabulary.
///
/// [`TemplateStore`]: crate::TemplateStore
#[derive(Debug, Clone, PartialEq)]
pub struct GestureTemplate {
    /// Frame dimensionality (0 until the first frame is pushed).
    dimensions: usize,

    /// First raw frame, subtracted from every pushed frame.
    origin: Option<DVector<f64>>,

    /// Frames relative to `origin`.
    frames: Vec<DVector<f64>>,

    /// Per-dimension minimum (`+inf` while empty).
    min_range: DVector<f64>,

    /// Per-dimension maximum (`-inf` while empty).
    max_range: DVector<f64>,
}

impl GestureTemplate {
    /// Create an empty template with the given dimensionality.
    ///
    /// A dimensionality of 0 means "adopt the dimensionality of the first frame".
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            origin: None,
            frames: Vec::new(),
            min_range: DVector::from_element(dimensions, f64::INFINITY),
            max_range: DVector::from_element(dimensions, f64::NEG_INFINITY),
        }
    }

    /// Build a template from a sequence of raw frames.
    ///
    /// # Arguments
    /// * `frames` - Raw frames, all of the same length
    pub fn from_frames<F: AsRef<[f64]>>(frames: &[F]) -> Result<Self> {
        let mut template = Self::new(0);
        for frame in frames {
            template.push(frame.as_ref())?;
        }
        Ok(template)
    }

    /// Append a raw frame, re-basing it on the template origin.
    ///
    /// The first frame of an empty template fixes its dimensionality (when the
    /// template was created with 0 dimensions) and becomes the origin.
    pub fn push(&mut self, frame: &[f64]) -> Result<()> {
        if self.frames.is_empty() && (self.dimensions == 0 || frame.len() != self.dimensions) {
            self.dimensions = frame.len();
            self.reset_ranges();
        }
        if frame.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                got: frame.len(),
            });
        }

        let raw = DVector::from_column_slice(frame);
        let origin = self.origin.get_or_insert_with(|| raw.clone());
        let relative = raw - &*origin;

        for d in 0..self.dimensions {
            self.min_range[d] = self.min_range[d].min(relative[d]);
            self.max_range[d] = self.max_range[d].max(relative[d]);
        }
        self.frames.push(relative);
        Ok(())
    }

    /// Drop every frame and the origin, keeping the dimensionality.
    pub fn clear(&mut self) {
        self.origin = None;
        self.frames.clear();
        self.reset_ranges();
    }

    fn reset_ranges(&mut self) {
        self.min_range = DVector::from_element(self.dimensions, f64::INFINITY);
        self.max_range = DVector::from_element(self.dimensions, f64::NEG_INFINITY);
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame dimensionality.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// All frames, relative to the first one.
    pub fn frames(&self) -> &[DVector<f64>] {
        &self.frames
    }

    /// Frame at `index`, relative to the first one.
    pub fn frame(&self, index: usize) -> Option<&DVector<f64>> {
        self.frames.get(index)
    }

    /// Most recently pushed frame.
    pub fn last_frame(&self) -> Option<&DVector<f64>> {
        self.frames.last()
    }

    /// Raw first frame, if any frame was pushed.
    pub fn origin(&self) -> Option<&DVector<f64>> {
        self.origin.as_ref()
    }

    /// Frame corresponding to a phase value.
    ///
    /// The index is `floor(alignment * len)` clamped to `[0, len - 1]`.
    pub fn frame_at(&self, alignment: f64) -> Option<&DVector<f64>> {
        if self.frames.is_empty() {
            return None;
        }
        let last = self.frames.len() - 1;
        let index = (alignment * self.frames.len() as f64).floor();
        let index = if index.is_nan() || index < 0.0 {
            0
        } else {
            (index as usize).min(last)
        };
        self.frames.get(index)
    }

    pub fn min_range(&self) -> &DVector<f64> {
        &self.min_range
    }

    pub fn max_range(&self) -> &DVector<f64> {
        &self.max_range
    }

    /// Overwrite the value ranges (used when the vocabulary ranges change).
    pub(crate) fn set_ranges(&mut self, min_range: DVector<f64>, max_range: DVector<f64>) {
        self.min_range = min_range;
        self.max_range = max_range;
    }
}

impl Default for GestureTemplate {
    fn default() -> Self {
        Self::new(0)
    }
}
