//! Append-only record of computed harmonics.
//!
//! Each entry keeps the grid it was computed on. Entries are never edited
//! after they are pushed, including when the cascade later refines its grid.

use std::sync::Arc;

use crate::error::ResonaError;
use crate::types::HarmonicField;

#[derive(Debug, Clone, Default)]
pub struct HarmonicHistory {
    entries: Vec<Arc<HarmonicField>>,
}

impl HarmonicHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next order. Orders must arrive as `0, 1, 2, …`.
    pub fn push(&mut self, field: HarmonicField) -> Result<Arc<HarmonicField>, ResonaError> {
        if field.order != self.entries.len() {
            return Err(ResonaError::InvalidParameter(format!(
                "history expects order {}, got {}",
                self.entries.len(),
                field.order
            )));
        }
        let field = Arc::new(field);
        self.entries.push(Arc::clone(&field));
        Ok(field)
    }

    pub fn get(&self, order: usize) -> Option<&Arc<HarmonicField>> {
        self.entries.get(order)
    }

    pub fn last(&self) -> Option<&Arc<HarmonicField>> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<HarmonicField>> {
        self.entries.iter()
    }

    pub fn fields(&self) -> &[Arc<HarmonicField>] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use num_complex::Complex64;
    use resona_geometry::VoxelGrid;

    fn field(order: usize) -> HarmonicField {
        let grid = Arc::new(VoxelGrid::new([0.0; 3], 1.0, [2, 2, 2]).unwrap());
        HarmonicField::new(
            order,
            (order + 1) as f64,
            Complex64::new(1.0, 0.0),
            grid,
            Array3::zeros((2, 2, 2)),
        )
        .unwrap()
    }

    #[test]
    fn test_orders_must_be_sequential() {
        let mut h = HarmonicHistory::new();
        h.push(field(0)).unwrap();
        assert!(h.push(field(2)).is_err());
        h.push(field(1)).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.last().unwrap().harmonic(), 2);
    }
}
