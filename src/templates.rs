//! Template store: the vocabulary of recorded gestures.

use std::fmt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::{Error, GestureTemplate, Result};

/// Typed index of a template in the vocabulary (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub usize);

impl TemplateId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Vocabulary of gesture templates sharing one dimensionality.
///
/// Every mutation recomputes the per-dimension min/max across the whole
/// vocabulary and propagates it to each template.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: Vec<GestureTemplate>,
    min_range: DVector<f64>,
    max_range: DVector<f64>,
}

impl TemplateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            templates: Vec::new(),
            min_range: DVector::zeros(0),
            max_range: DVector::zeros(0),
        }
    }

    /// Append a template to the vocabulary.
    ///
    /// An empty vocabulary adopts the template's dimensionality; otherwise the
    /// dimensionality must match.
    pub fn add(&mut self, template: GestureTemplate) -> Result<TemplateId> {
        if template.is_empty() {
            return Err(Error::EmptyTemplate);
        }
        if let Some(expected) = self.dimensions() {
            if template.dimensions() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    got: template.dimensions(),
                });
            }
        }

        self.templates.push(template);
        self.recompute_ranges();
        Ok(TemplateId(self.templates.len() - 1))
    }

    /// Substitute the template at `id`. The dimensionality must match.
    pub fn replace(&mut self, id: TemplateId, template: GestureTemplate) -> Result<()> {
        if template.is_empty() {
            return Err(Error::EmptyTemplate);
        }
        let expected = self.dimensions().unwrap_or(template.dimensions());
        if template.dimensions() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                got: template.dimensions(),
            });
        }
        let slot = self
            .templates
            .get_mut(id.index())
            .ok_or(Error::InvalidTemplateId(id.index()))?;
        *slot = template;
        self.recompute_ranges();
        Ok(())
    }

    /// Remove and return the template at `id`. Later ids shift down by one.
    pub fn remove(&mut self, id: TemplateId) -> Result<GestureTemplate> {
        if id.index() >= self.templates.len() {
            return Err(Error::InvalidTemplateId(id.index()));
        }
        let removed = self.templates.remove(id.index());
        self.recompute_ranges();
        Ok(removed)
    }

    /// Drop every template.
    pub fn clear(&mut self) {
        self.templates.clear();
        self.recompute_ranges();
    }

    pub fn get(&self, id: TemplateId) -> Option<&GestureTemplate> {
        self.templates.get(id.index())
    }

    pub fn templates(&self) -> &[GestureTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterate over every template id.
    pub fn ids(&self) -> impl Iterator<Item = TemplateId> {
        (0..self.templates.len()).map(TemplateId)
    }

    /// Shared dimensionality, or `None` for an empty vocabulary.
    pub fn dimensions(&self) -> Option<usize> {
        self.templates.first().map(|t| t.dimensions())
    }

    /// Per-dimension minimum across the vocabulary.
    pub fn min_range(&self) -> &DVector<f64> {
        &self.min_range
    }

    /// Per-dimension maximum across the vocabulary.
    pub fn max_range(&self) -> &DVector<f64> {
        &self.max_range
    }

    /// Mean over templates of the mean per-dimension value range.
    ///
    /// Returns `None` for an empty vocabulary.
    pub fn mean_range(&self) -> Option<f64> {
        let dims = self.dimensions()?;
        if dims == 0 {
            return None;
        }
        let total: f64 = self
            .templates
            .iter()
            .map(|t| {
                (0..dims)
                    .map(|d| t.max_range()[d] - t.min_range()[d])
                    .sum::<f64>()
                    / dims as f64
            })
            .sum();
        Some(total / self.templates.len() as f64)
    }

    fn recompute_ranges(&mut self) {
        let dims = self.dimensions().unwrap_or(0);
        let mut min_range = DVector::from_element(dims, f64::INFINITY);
        let mut max_range = DVector::from_element(dims, f64::NEG_INFINITY);

        for template in &self.templates {
            for frame in template.frames() {
                for d in 0..dims {
                    min_range[d] = min_range[d].min(frame[d]);
                    max_range[d] = max_range[d].max(frame[d]);
                }
            }
        }

        for template in &mut self.templates {
            template.set_ranges(min_range.clone(), max_range.clone());
        }
        self.min_range = min_range;
        self.max_range = max_range;
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn template(frames: &[[f64; 2]]) -> GestureTemplate {
        GestureTemplate::from_frames(frames).unwrap()
    }

    #[test]
    fn test_add_recomputes_global_ranges() {
        let mut store = TemplateStore::new();
        store.add(template(&[[0.0, 0.0], [1.0, 0.0]])).unwrap();
        store.add(template(&[[0.0, 0.0], [0.0, -3.0]])).unwrap();

        assert_eq!(store.len(), 2);
        assert_relative_eq!(store.min_range()[0], 0.0);
        assert_relative_eq!(store.max_range()[0], 1.0);
        assert_relative_eq!(store.min_range()[1], -3.0);
        assert_relative_eq!(store.max_range()[1], 0.0);

        // Ranges are propagated to every template
        for t in store.templates() {
            assert_eq!(t.min_range(), store.min_range());
            assert_eq!(t.max_range(), store.max_range());
        }
    }

    #[test]
    fn test_add_rejects_dimension_mismatch() {
        let mut store = TemplateStore::new();
        store.add(template(&[[0.0, 0.0], [1.0, 1.0]])).unwrap();

        let three_d = GestureTemplate::from_frames(&[[0.0, 0.0, 0.0]]).unwrap();
        let err = store.add(three_d).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 3 }));
    }

    #[test]
    fn test_empty_store_adopts_dimensions() {
        let mut store = TemplateStore::new();
        store.add(template(&[[0.0, 0.0]])).unwrap();
        store.clear();

        let three_d = GestureTemplate::from_frames(&[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]]).unwrap();
        store.add(three_d).unwrap();
        assert_eq!(store.dimensions(), Some(3));
    }

    #[test]
    fn test_replace() {
        let mut store = TemplateStore::new();
        store.add(template(&[[0.0, 0.0], [1.0, 1.0]])).unwrap();
        store.add(template(&[[0.0, 0.0], [5.0, 5.0]])).unwrap();

        store.replace(TemplateId(1), template(&[[0.0, 0.0], [2.0, 2.0], [3.0, 3.0]])).unwrap();
        assert_eq!(store.get(TemplateId(1)).unwrap().len(), 3);
        assert_relative_eq!(store.max_range()[0], 3.0);

        let three_d = GestureTemplate::from_frames(&[[0.0, 0.0, 0.0]]).unwrap();
        assert!(store.replace(TemplateId(0), three_d).is_err());
        assert!(matches!(
            store.replace(TemplateId(7), template(&[[0.0, 0.0]])),
            Err(Error::InvalidTemplateId(7))
        ));
    }

    #[test]
    fn test_remove_shifts_ids() {
        let mut store = TemplateStore::new();
        store.add(template(&[[0.0, 0.0], [1.0, 0.0]])).unwrap();
        store.add(template(&[[0.0, 0.0], [2.0, 0.0], [4.0, 0.0]])).unwrap();

        let removed = store.remove(TemplateId(0)).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(TemplateId(0)).unwrap().len(), 3);
        assert_relative_eq!(store.max_range()[0], 4.0);
        assert!(store.remove(TemplateId(3)).is_err());
    }

    #[test]
    fn test_empty_template_rejected() {
        let mut store = TemplateStore::new();
        assert!(matches!(store.add(GestureTemplate::new(2)), Err(Error::EmptyTemplate)));
    }

    #[test]
    fn test_mean_range() {
        let mut store = TemplateStore::new();
        assert!(store.mean_range().is_none());

        store.add(template(&[[0.0, 0.0], [2.0, 4.0]])).unwrap();
        // ranges: dim0 = 2, dim1 = 4 -> mean 3
        assert_relative_eq!(store.mean_range().unwrap(), 3.0);
    }
}
