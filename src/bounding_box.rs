use nalgebra::Vector3;

/// Tolerance (mm) below which touching volumes are not treated as overlapping.
pub const OVERLAP_TOLERANCE: f64 = 1e-9;

/// Axis-aligned box in the frame of a mother volume.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub lower_left: [f64; 3],
    pub upper_right: [f64; 3],
    pub center: [f64; 3],
    pub width: [f64; 3],
}

impl BoundingBox {
    pub fn new(lower_left: [f64; 3], upper_right: [f64; 3]) -> Self {
        let center = [
            0.5 * (lower_left[0] + upper_right[0]),
            0.5 * (lower_left[1] + upper_right[1]),
            0.5 * (lower_left[2] + upper_right[2]),
        ];
        let width = [
            upper_right[0] - lower_left[0],
            upper_right[1] - lower_left[1],
            upper_right[2] - lower_left[2],
        ];
        BoundingBox {
            lower_left,
            upper_right,
            center,
            width,
        }
    }

    /// Box of the given half-lengths centred on `offset`.
    pub fn from_half_lengths(half: [f64; 3], offset: &Vector3<f64>) -> Self {
        Self::new(
            [offset.x - half[0], offset.y - half[1], offset.z - half[2]],
            [offset.x + half[0], offset.y + half[1], offset.z + half[2]],
        )
    }

    /// True when the two boxes share a volume thicker than the tolerance.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        (0..3).all(|axis| {
            let low = self.lower_left[axis].max(other.lower_left[axis]);
            let high = self.upper_right[axis].min(other.upper_right[axis]);
            high - low > OVERLAP_TOLERANCE
        })
    }

    /// True when `other` lies entirely inside this box (within tolerance).
    pub fn encloses(&self, other: &BoundingBox) -> bool {
        (0..3).all(|axis| {
            other.lower_left[axis] >= self.lower_left[axis] - OVERLAP_TOLERANCE
                && other.upper_right[axis] <= self.upper_right[axis] + OVERLAP_TOLERANCE
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_and_width() {
        let bb = BoundingBox::new([-1.0, -2.0, -3.0], [1.0, 2.0, 5.0]);
        assert_eq!(bb.center, [0.0, 0.0, 1.0]);
        assert_eq!(bb.width, [2.0, 4.0, 8.0]);
    }

    #[test]
    fn test_touching_boxes_do_not_overlap() {
        let a = BoundingBox::from_half_lengths([1.0, 1.0, 1.0], &Vector3::new(0.0, 0.0, 0.0));
        let b = BoundingBox::from_half_lengths([1.0, 1.0, 1.0], &Vector3::new(0.0, 0.0, 2.0));
        assert!(!a.overlaps(&b));
        let c = BoundingBox::from_half_lengths([1.0, 1.0, 1.0], &Vector3::new(0.0, 0.0, 1.5));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
    }

    #[test]
    fn test_encloses() {
        let mother = BoundingBox::from_half_lengths([10.0, 10.0, 10.0], &Vector3::zeros());
        let inside = BoundingBox::from_half_lengths([1.0, 1.0, 1.0], &Vector3::new(0.0, 0.0, 9.0));
        let outside = BoundingBox::from_half_lengths([1.0, 1.0, 1.0], &Vector3::new(0.0, 0.0, 9.5));
        assert!(mother.encloses(&inside));
        assert!(!mother.encloses(&outside));
    }
}
