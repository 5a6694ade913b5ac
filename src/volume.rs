use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bounding_box::BoundingBox;
use crate::error::GeometryError;

/// Index of a volume inside its `GeometryModel` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(pub usize);

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a volume is for in a parametric tracker. Loaded geometries use `Generic`
/// for everything except the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeRole {
    World,
    Target,
    Tracker,
    Chamber,
    Generic,
}

/// Auxiliary annotation attached to a volume in a geometry description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auxiliary {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

fn full_turn() -> f64 {
    360.0
}

/// Solid shape of a volume. Lengths in mm, angles in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Box {
        half_x: f64,
        half_y: f64,
        half_z: f64,
    },
    /// Cylindrical section along z
    Cylinder {
        #[serde(default)]
        inner_radius: f64,
        outer_radius: f64,
        half_z: f64,
        #[serde(default)]
        start_phi: f64,
        #[serde(default = "full_turn")]
        delta_phi: f64,
    },
    Sphere {
        #[serde(default)]
        inner_radius: f64,
        outer_radius: f64,
    },
    /// Conical section along z; index 1 is the -z face, index 2 the +z face
    Cone {
        #[serde(default)]
        inner_radius_1: f64,
        outer_radius_1: f64,
        #[serde(default)]
        inner_radius_2: f64,
        outer_radius_2: f64,
        half_z: f64,
    },
}

impl Shape {
    /// Full cylinder with no inner bore.
    pub fn tube(outer_radius: f64, half_z: f64) -> Self {
        Shape::Cylinder {
            inner_radius: 0.0,
            outer_radius,
            half_z,
            start_phi: 0.0,
            delta_phi: full_turn(),
        }
    }

    pub fn cuboid(half_x: f64, half_y: f64, half_z: f64) -> Self {
        Shape::Box {
            half_x,
            half_y,
            half_z,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Shape::Box { .. } => "box",
            Shape::Cylinder { .. } => "cylinder",
            Shape::Sphere { .. } => "sphere",
            Shape::Cone { .. } => "cone",
        }
    }

    /// Reject negative, non-finite or inverted dimensions.
    pub fn validate(&self, volume_name: &str) -> Result<(), GeometryError> {
        let invalid = |reason: String| GeometryError::InvalidShape {
            name: volume_name.to_string(),
            reason,
        };
        let positive = |label: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(invalid(format!("{} must be positive, got {}", label, value)))
            }
        };
        let radii = |inner: f64, outer: f64| {
            if inner.is_finite() && inner >= 0.0 && inner < outer {
                Ok(())
            } else {
                Err(invalid(format!(
                    "inner radius {} must lie in [0, {})",
                    inner, outer
                )))
            }
        };

        match *self {
            Shape::Box {
                half_x,
                half_y,
                half_z,
            } => {
                positive("half_x", half_x)?;
                positive("half_y", half_y)?;
                positive("half_z", half_z)
            }
            Shape::Cylinder {
                inner_radius,
                outer_radius,
                half_z,
                delta_phi,
                ..
            } => {
                positive("outer_radius", outer_radius)?;
                positive("half_z", half_z)?;
                radii(inner_radius, outer_radius)?;
                if delta_phi > 0.0 && delta_phi <= 360.0 {
                    Ok(())
                } else {
                    Err(invalid(format!("delta_phi {} must lie in (0, 360]", delta_phi)))
                }
            }
            Shape::Sphere {
                inner_radius,
                outer_radius,
            } => {
                positive("outer_radius", outer_radius)?;
                radii(inner_radius, outer_radius)
            }
            Shape::Cone {
                inner_radius_1,
                outer_radius_1,
                inner_radius_2,
                outer_radius_2,
                half_z,
            } => {
                positive("half_z", half_z)?;
                positive("outer_radius_1", outer_radius_1)?;
                positive("outer_radius_2", outer_radius_2)?;
                radii(inner_radius_1, outer_radius_1)?;
                radii(inner_radius_2, outer_radius_2)
            }
        }
    }

    /// Half-lengths of the axis-aligned box enclosing the shape.
    pub fn half_extent(&self) -> [f64; 3] {
        match *self {
            Shape::Box {
                half_x,
                half_y,
                half_z,
            } => [half_x, half_y, half_z],
            Shape::Cylinder {
                outer_radius,
                half_z,
                ..
            } => [outer_radius, outer_radius, half_z],
            Shape::Sphere { outer_radius, .. } => [outer_radius; 3],
            Shape::Cone {
                outer_radius_1,
                outer_radius_2,
                half_z,
                ..
            } => {
                let r = outer_radius_1.max(outer_radius_2);
                [r, r, half_z]
            }
        }
    }

    /// Point-in-solid test in the shape's own frame.
    pub fn contains_local(&self, p: &Vector3<f64>) -> bool {
        match *self {
            Shape::Box {
                half_x,
                half_y,
                half_z,
            } => p.x.abs() <= half_x && p.y.abs() <= half_y && p.z.abs() <= half_z,
            Shape::Cylinder {
                inner_radius,
                outer_radius,
                half_z,
                start_phi,
                delta_phi,
            } => {
                let r = p.x.hypot(p.y);
                p.z.abs() <= half_z
                    && r >= inner_radius
                    && r <= outer_radius
                    && phi_within(p, start_phi, delta_phi)
            }
            Shape::Sphere {
                inner_radius,
                outer_radius,
            } => {
                let r = p.norm();
                r >= inner_radius && r <= outer_radius
            }
            Shape::Cone {
                inner_radius_1,
                outer_radius_1,
                inner_radius_2,
                outer_radius_2,
                half_z,
            } => {
                if p.z.abs() > half_z {
                    return false;
                }
                let t = (p.z + half_z) / (2.0 * half_z);
                let rmin = inner_radius_1 + t * (inner_radius_2 - inner_radius_1);
                let rmax = outer_radius_1 + t * (outer_radius_2 - outer_radius_1);
                let r = p.x.hypot(p.y);
                r >= rmin && r <= rmax
            }
        }
    }
}

fn phi_within(p: &Vector3<f64>, start_phi: f64, delta_phi: f64) -> bool {
    if delta_phi >= 360.0 || (p.x == 0.0 && p.y == 0.0) {
        return true;
    }
    let phi = p.y.atan2(p.x).to_degrees().rem_euclid(360.0);
    let offset = (phi - start_phi).rem_euclid(360.0);
    offset <= delta_phi
}

/// One placed volume in the geometry tree.
///
/// Identity is the pair (name, copy number). Parent and children are arena
/// indices; the parent link is structural only.
#[derive(Debug, Clone, Serialize)]
pub struct Volume {
    pub name: String,
    pub copy_number: u32,
    pub shape: Shape,
    pub material: String,
    /// Placement relative to the mother volume's centre
    pub translation: Vector3<f64>,
    pub role: VolumeRole,
    pub sensitive: bool,
    pub auxiliary: Vec<Auxiliary>,
    pub(crate) parent: Option<VolumeId>,
    pub(crate) children: Vec<VolumeId>,
}

impl Volume {
    pub fn new(name: &str, copy_number: u32, shape: Shape, material: &str) -> Self {
        Volume {
            name: name.to_string(),
            copy_number,
            shape,
            material: material.to_string(),
            translation: Vector3::zeros(),
            role: VolumeRole::Generic,
            sensitive: false,
            auxiliary: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_translation(mut self, translation: Vector3<f64>) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_role(mut self, role: VolumeRole) -> Self {
        self.role = role;
        self
    }

    pub fn parent(&self) -> Option<VolumeId> {
        self.parent
    }

    pub fn children(&self) -> &[VolumeId] {
        &self.children
    }

    pub fn has_auxiliary(&self, kind: &str) -> bool {
        self.auxiliary.iter().any(|aux| aux.kind == kind)
    }

    /// Bounding box in the mother volume's frame.
    pub fn extent_in_mother(&self) -> BoundingBox {
        BoundingBox::from_half_lengths(self.shape.half_extent(), &self.translation)
    }

    /// Display label `name[copy]` used in logs and errors.
    pub fn label(&self) -> String {
        format!("{}[{}]", self.name, self.copy_number)
    }
}
