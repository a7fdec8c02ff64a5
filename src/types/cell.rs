use crate::types::DISTANCE_UNKNOWN;

/// One lattice cell of the likelihood field.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    /// Distance in meters from the cell center to the nearest occupied voxel,
    /// or [`DISTANCE_UNKNOWN`] if not computed.
    pub distance: f32,
    /// Gaussian likelihood of `distance`, in [0, 1].
    pub probability: f32,
}

impl Default for GridCell {
    fn default() -> Self {
        Self {
            distance: DISTANCE_UNKNOWN,
            probability: 0.0,
        }
    }
}

impl GridCell {
    /// Cell at `distance` meters from the nearest obstacle, weighted with a
    /// zero-mean Gaussian of standard deviation `sensor_deviation`.
    #[inline]
    pub fn from_distance(distance: f32, sensor_deviation: f32) -> Self {
        let probability =
            (-(distance * distance) / (2.0 * sensor_deviation * sensor_deviation)).exp();
        Self {
            distance,
            probability,
        }
    }

    #[inline]
    pub fn is_known(&self) -> bool {
        self.distance >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obstacle_cell_has_unit_probability() {
        let cell = GridCell::from_distance(0.0, 0.2);
        assert_eq!(cell.probability, 1.0);
        assert!(cell.is_known());
        assert!(!GridCell::default().is_known());
    }

    #[test]
    fn probability_decays_with_distance() {
        let near = GridCell::from_distance(0.1, 0.2);
        let far = GridCell::from_distance(0.5, 0.2);
        assert!(near.probability < 1.0);
        assert!(far.probability < near.probability);
        assert!((near.probability - (-0.125f32).exp()).abs() < 1e-6);
    }
}
