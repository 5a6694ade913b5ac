use log::{info, warn};
use nalgebra::Vector3;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::GeometryError;
use crate::volume::{Auxiliary, Shape, Volume, VolumeId, VolumeRole};

/// Auxiliary tag marking a described volume as sensitive.
pub const SENSITIVE_AUX_TAG: &str = "SensDet";

/// NIST material names the transport engine is expected to know. Anything
/// else only produces a warning.
static KNOWN_MATERIALS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "G4_Galactic",
        "G4_AIR",
        "G4_WATER",
        "G4_Al",
        "G4_Cu",
        "G4_Pb",
        "G4_Fe",
        "G4_W",
        "G4_Xe",
        "G4_CONCRETE",
        "G4_TISSUE_SOFT_ICRP",
        "G4_BONE_COMPACT_ICRU",
        "G4_Si",
        "G4_Ge",
        "G4_SODIUM_IODIDE",
        "G4_BGO",
        "G4_CESIUM_IODIDE",
        "G4_PLASTIC_SC_VINYLTOLUENE",
    ]
    .into_iter()
    .collect()
});

pub fn is_known_material(name: &str) -> bool {
    KNOWN_MATERIALS.contains(name)
}

/// Parameters of the fixed-target chamber tracker. Lengths in mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChamberTrackerConfig {
    pub chambers: u32,
    pub chamber_spacing: f64,
    pub chamber_width: f64,
    pub target_length: f64,
    pub target_material: String,
    pub chamber_material: String,
    pub world_material: String,
    pub check_overlaps: bool,
}

impl Default for ChamberTrackerConfig {
    fn default() -> Self {
        Self {
            chambers: 5,
            chamber_spacing: 800.0,
            chamber_width: 200.0,
            target_length: 50.0,
            target_material: "G4_Pb".to_string(),
            chamber_material: "G4_Xe".to_string(),
            world_material: "G4_AIR".to_string(),
            check_overlaps: true,
        }
    }
}

impl ChamberTrackerConfig {
    pub fn tracker_length(&self) -> f64 {
        (self.chambers as f64 + 1.0) * self.chamber_spacing
    }

    pub fn world_length(&self) -> f64 {
        1.2 * (2.0 * self.target_length + self.tracker_length())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl From<Position> for Vector3<f64> {
    fn from(p: Position) -> Self {
        Vector3::new(p.x, p.y, p.z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldDescription {
    pub half_x: f64,
    pub half_y: f64,
    pub half_z: f64,
    pub material: String,
}

impl Default for WorldDescription {
    fn default() -> Self {
        Self {
            half_x: 1000.0,
            half_y: 1000.0,
            half_z: 1000.0,
            material: "G4_AIR".to_string(),
        }
    }
}

/// One volume of a loaded hierarchical description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDescription {
    pub name: String,
    pub solid: Shape,
    pub material: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub copy_number: u32,
    #[serde(default)]
    pub is_sensitive: bool,
    #[serde(default)]
    pub auxiliary: Vec<Auxiliary>,
    #[serde(default)]
    pub children: Vec<VolumeDescription>,
}

impl VolumeDescription {
    pub fn is_tagged_sensitive(&self) -> bool {
        self.is_sensitive
            || self
                .auxiliary
                .iter()
                .any(|aux| aux.kind == SENSITIVE_AUX_TAG)
    }
}

fn default_true() -> bool {
    true
}

/// Hierarchical geometry loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDescription {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub world: WorldDescription,
    #[serde(default)]
    pub volumes: Vec<VolumeDescription>,
    #[serde(default = "default_true")]
    pub check_overlaps: bool,
}

impl GeometryDescription {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, GeometryError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// How the volume tree is obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryConfig {
    Parametric(ChamberTrackerConfig),
    Described(GeometryDescription),
    File { path: PathBuf },
}

impl Default for GeometryConfig {
    fn default() -> Self {
        GeometryConfig::Parametric(ChamberTrackerConfig::default())
    }
}

/// Immutable tree of placed volumes. Index 0 is the world.
#[derive(Debug, Clone, Serialize)]
pub struct GeometryModel {
    volumes: Vec<Volume>,
}

impl GeometryModel {
    /// Build the volume tree described by `config`.
    pub fn build(config: &GeometryConfig) -> Result<Self, GeometryError> {
        match config {
            GeometryConfig::Parametric(tracker) => Self::chamber_tracker(tracker),
            GeometryConfig::Described(description) => Self::from_description(description),
            GeometryConfig::File { path } => {
                let description = GeometryDescription::from_json_file(path)?;
                Self::from_description(&description)
            }
        }
    }

    /// Target followed by a tracker of equally spaced chambers with linearly
    /// growing radius. Chambers are flagged sensitive.
    pub fn chamber_tracker(cfg: &ChamberTrackerConfig) -> Result<Self, GeometryError> {
        if cfg.chamber_spacing < cfg.chamber_width {
            return Err(GeometryError::SpacingSmallerThanWidth {
                spacing: cfg.chamber_spacing,
                width: cfg.chamber_width,
            });
        }

        let tracker_length = cfg.tracker_length();
        let world_length = cfg.world_length();
        let target_radius = 0.5 * cfg.target_length;
        let tracker_size = 0.5 * tracker_length;

        info!("Geometry parameters:");
        info!("  World extent: {} m", world_length / 1000.0);
        info!("  Target length: {} cm", cfg.target_length / 10.0);
        info!("  Tracker length: {} cm", tracker_length / 10.0);
        info!("  Number of chambers: {}", cfg.chambers);

        let half_world = 0.5 * world_length;
        let world = Volume::new(
            "World",
            0,
            Shape::cuboid(half_world, half_world, half_world),
            &cfg.world_material,
        )
        .with_role(VolumeRole::World);
        let mut builder = TreeBuilder::new(world)?;
        let root = VolumeId(0);

        let target_z = -(cfg.target_length + tracker_length) / 2.0;
        let target = Volume::new(
            "Target",
            0,
            Shape::tube(target_radius, cfg.target_length / 2.0),
            &cfg.target_material,
        )
        .with_translation(Vector3::new(0.0, 0.0, target_z))
        .with_role(VolumeRole::Target);
        builder.place(root, target)?;
        info!("  Target positioned at z = {} cm", target_z / 10.0);

        let tracker = Volume::new(
            "Tracker",
            0,
            Shape::tube(tracker_size, tracker_size),
            &cfg.world_material,
        )
        .with_role(VolumeRole::Tracker);
        let tracker_id = builder.place(root, tracker)?;

        let first_position = -tracker_size + cfg.chamber_spacing;
        let first_length = tracker_length / 10.0;
        let last_length = tracker_length;
        let half_width = 0.5 * cfg.chamber_width;
        let rmax_first = 0.5 * first_length;
        let rmax_incr = if cfg.chambers > 1 {
            0.5 * (last_length - first_length) / (cfg.chambers - 1) as f64
        } else {
            0.0
        };

        for copy_no in 0..cfg.chambers {
            let z = first_position + copy_no as f64 * cfg.chamber_spacing;
            let rmax = rmax_first + copy_no as f64 * rmax_incr;
            let mut chamber = Volume::new(
                "Chamber",
                copy_no,
                Shape::tube(rmax, half_width),
                &cfg.chamber_material,
            )
            .with_translation(Vector3::new(0.0, 0.0, z))
            .with_role(VolumeRole::Chamber);
            chamber.sensitive = true;
            builder.place(tracker_id, chamber)?;
            info!("  Chamber {} at z = {} cm, rmax = {} cm", copy_no, z / 10.0, rmax / 10.0);
        }

        builder.finish(cfg.check_overlaps)
    }

    /// Build from a loaded description. Volumes are sensitive when they carry
    /// an explicit annotation.
    pub fn from_description(description: &GeometryDescription) -> Result<Self, GeometryError> {
        if description.volumes.is_empty() {
            return Err(GeometryError::Empty);
        }
        let w = &description.world;
        let world = Volume::new(
            "World",
            0,
            Shape::cuboid(w.half_x, w.half_y, w.half_z),
            &w.material,
        )
        .with_role(VolumeRole::World);
        let mut builder = TreeBuilder::new(world)?;
        for volume in &description.volumes {
            place_described(&mut builder, VolumeId(0), volume)?;
        }
        let model = builder.finish(description.check_overlaps)?;
        info!(
            "Loaded geometry '{}' with {} volumes",
            description.name,
            model.len()
        );
        Ok(model)
    }

    pub fn root(&self) -> VolumeId {
        VolumeId(0)
    }

    pub fn get(&self, id: VolumeId) -> Option<&Volume> {
        self.volumes.get(id.0)
    }

    pub fn world(&self) -> &Volume {
        &self.volumes[0]
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn children(&self, id: VolumeId) -> &[VolumeId] {
        self.get(id).map(|v| v.children()).unwrap_or(&[])
    }

    /// Find the placement with the given identity. When the same identity is
    /// placed under several mothers, the first one in pre-order wins.
    pub fn find(&self, name: &str, copy_number: u32) -> Option<VolumeId> {
        self.iter_preorder()
            .find(|(_, v)| v.name == name && v.copy_number == copy_number)
            .map(|(id, _)| id)
    }

    /// Depth-first pre-order walk starting at the world, children in order.
    pub fn iter_preorder(&self) -> PreOrder<'_> {
        PreOrder {
            model: self,
            stack: vec![self.root()],
        }
    }

    /// Position of a volume's centre in world coordinates.
    pub fn global_position(&self, id: VolumeId) -> Vector3<f64> {
        let mut position = Vector3::zeros();
        let mut current = self.get(id);
        while let Some(volume) = current {
            position += volume.translation;
            current = volume.parent.and_then(|p| self.get(p));
        }
        position
    }

    /// Deepest volume containing the world-frame point, or None outside the world.
    pub fn locate(&self, point: &Vector3<f64>) -> Option<VolumeId> {
        let root = self.root();
        let local = point - self.world().translation;
        if !self.world().shape.contains_local(&local) {
            return None;
        }
        let mut current = root;
        let mut local = local;
        'descend: loop {
            for &child_id in self.children(current) {
                let child = &self.volumes[child_id.0];
                let child_local = local - child.translation;
                if child.shape.contains_local(&child_local) {
                    current = child_id;
                    local = child_local;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }
}

pub struct PreOrder<'a> {
    model: &'a GeometryModel,
    stack: Vec<VolumeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = (VolumeId, &'a Volume);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let volume = self.model.get(id)?;
        self.stack.extend(volume.children().iter().rev().copied());
        Some((id, volume))
    }
}

fn place_described(
    builder: &mut TreeBuilder,
    mother: VolumeId,
    description: &VolumeDescription,
) -> Result<(), GeometryError> {
    let mut volume = Volume::new(
        &description.name,
        description.copy_number,
        description.solid.clone(),
        &description.material,
    )
    .with_translation(description.position.into());
    volume.auxiliary = description.auxiliary.clone();
    volume.sensitive = description.is_tagged_sensitive();
    let id = builder.place(mother, volume)?;
    for child in &description.children {
        place_described(builder, id, child)?;
    }
    Ok(())
}

/// Arena under construction. Validation happens as volumes are placed and,
/// for overlaps, once the tree is complete.
struct TreeBuilder {
    volumes: Vec<Volume>,
    /// (mother, name, copy number) of every daughter placed so far
    identities: HashSet<(VolumeId, String, u32)>,
}

impl TreeBuilder {
    fn new(world: Volume) -> Result<Self, GeometryError> {
        world.shape.validate(&world.name)?;
        warn_unknown_material(&world);
        Ok(Self {
            volumes: vec![world],
            identities: HashSet::new(),
        })
    }

    fn place(&mut self, mother: VolumeId, mut volume: Volume) -> Result<VolumeId, GeometryError> {
        volume.shape.validate(&volume.name)?;
        if !self
            .identities
            .insert((mother, volume.name.clone(), volume.copy_number))
        {
            return Err(GeometryError::DuplicatePlacement {
                mother: self.volumes[mother.0].name.clone(),
                name: volume.name,
                copy_number: volume.copy_number,
            });
        }
        warn_unknown_material(&volume);
        let id = VolumeId(self.volumes.len());
        volume.parent = Some(mother);
        self.volumes.push(volume);
        self.volumes[mother.0].children.push(id);
        Ok(id)
    }

    fn finish(self, check_overlaps: bool) -> Result<GeometryModel, GeometryError> {
        if check_overlaps {
            for mother in &self.volumes {
                self.check_daughters(mother)?;
            }
        }
        Ok(GeometryModel {
            volumes: self.volumes,
        })
    }

    fn check_daughters(&self, mother: &Volume) -> Result<(), GeometryError> {
        let mother_box = crate::bounding_box::BoundingBox::from_half_lengths(
            mother.shape.half_extent(),
            &Vector3::zeros(),
        );
        let boxes: Vec<_> = mother
            .children()
            .iter()
            .map(|id| (&self.volumes[id.0], self.volumes[id.0].extent_in_mother()))
            .collect();
        for (i, (first, first_box)) in boxes.iter().enumerate() {
            if !mother_box.encloses(first_box) {
                warn!(
                    "Volume {} protrudes from its mother volume {}",
                    first.label(),
                    mother.label()
                );
            }
            for (second, second_box) in &boxes[i + 1..] {
                if first_box.overlaps(second_box) {
                    return Err(GeometryError::Overlap {
                        mother: mother.label(),
                        first: first.label(),
                        second: second.label(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn warn_unknown_material(volume: &Volume) {
    if !is_known_material(&volume.material) {
        warn!(
            "Material '{}' for volume '{}' is not a standard G4 material",
            volume.material, volume.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chamber_ids(model: &GeometryModel) -> Vec<VolumeId> {
        model
            .iter_preorder()
            .filter(|(_, v)| v.role == VolumeRole::Chamber)
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn test_default_tracker_layout() {
        let cfg = ChamberTrackerConfig::default();
        let model = GeometryModel::chamber_tracker(&cfg).expect("Failed to build tracker");
        // world, target, tracker, 5 chambers
        assert_eq!(model.len(), 8);

        let chambers = chamber_ids(&model);
        assert_eq!(chambers.len(), 5);

        let expected_z = [-1600.0, -800.0, 0.0, 800.0, 1600.0];
        let expected_r = [240.0, 780.0, 1320.0, 1860.0, 2400.0];
        for (k, id) in chambers.iter().enumerate() {
            let chamber = model.get(*id).unwrap();
            assert_eq!(chamber.copy_number, k as u32);
            assert!(chamber.sensitive);
            assert!((chamber.translation.z - expected_z[k]).abs() < 1e-9);
            match chamber.shape {
                Shape::Cylinder { outer_radius, half_z, .. } => {
                    assert!((outer_radius - expected_r[k]).abs() < 1e-9);
                    assert_eq!(half_z, 100.0);
                }
                _ => panic!("Chamber should be a cylinder"),
            }
        }
    }

    #[test]
    fn test_spacing_smaller_than_width_is_fatal() {
        let cfg = ChamberTrackerConfig {
            chamber_spacing: 100.0,
            chamber_width: 200.0,
            ..Default::default()
        };
        let result = GeometryModel::chamber_tracker(&cfg);
        assert!(matches!(
            result,
            Err(GeometryError::SpacingSmallerThanWidth { .. })
        ));
    }

    #[test]
    fn test_single_chamber_has_no_radius_increment() {
        let cfg = ChamberTrackerConfig {
            chambers: 1,
            ..Default::default()
        };
        let model = GeometryModel::chamber_tracker(&cfg).unwrap();
        let chambers = chamber_ids(&model);
        assert_eq!(chambers.len(), 1);
        let chamber = model.get(chambers[0]).unwrap();
        assert_eq!(chamber.shape.half_extent()[0], 0.5 * cfg.tracker_length() / 10.0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = GeometryConfig::default();
        let a = GeometryModel::build(&config).unwrap();
        let b = GeometryModel::build(&config).unwrap();
        let names_a: Vec<_> = a.iter_preorder().map(|(_, v)| v.label()).collect();
        let names_b: Vec<_> = b.iter_preorder().map(|(_, v)| v.label()).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_preorder_visits_children_in_order() {
        let model = GeometryModel::chamber_tracker(&ChamberTrackerConfig::default()).unwrap();
        let labels: Vec<_> = model.iter_preorder().map(|(_, v)| v.label()).collect();
        assert_eq!(
            labels,
            vec![
                "World[0]",
                "Target[0]",
                "Tracker[0]",
                "Chamber[0]",
                "Chamber[1]",
                "Chamber[2]",
                "Chamber[3]",
                "Chamber[4]",
            ]
        );
    }

    #[test]
    fn test_locate_and_global_position() {
        let model = GeometryModel::chamber_tracker(&ChamberTrackerConfig::default()).unwrap();
        let chamber = model.find("Chamber", 3).unwrap();
        assert_eq!(model.global_position(chamber), Vector3::new(0.0, 0.0, 800.0));
        assert_eq!(model.locate(&Vector3::new(0.0, 0.0, 810.0)), Some(chamber));

        let tracker = model.find("Tracker", 0).unwrap();
        assert_eq!(model.locate(&Vector3::new(0.0, 0.0, 400.0)), Some(tracker));

        let target = model.find("Target", 0).unwrap();
        assert_eq!(model.locate(&Vector3::new(0.0, 0.0, -2425.0)), Some(target));

        assert_eq!(model.locate(&Vector3::new(0.0, 0.0, 1e6)), None);
    }

    fn detector_box(name: &str, z: f64) -> VolumeDescription {
        VolumeDescription {
            name: name.to_string(),
            solid: Shape::cuboid(50.0, 50.0, 50.0),
            material: "G4_WATER".to_string(),
            position: Position { x: 0.0, y: 0.0, z },
            copy_number: 0,
            is_sensitive: false,
            auxiliary: Vec::new(),
            children: Vec::new(),
        }
    }

    #[test]
    fn test_overlapping_siblings_rejected() {
        let description = GeometryDescription {
            name: "overlap".to_string(),
            description: None,
            world: WorldDescription::default(),
            volumes: vec![detector_box("a", 0.0), detector_box("b", 60.0)],
            check_overlaps: true,
        };
        let err = GeometryModel::from_description(&description).unwrap_err();
        assert!(matches!(err, GeometryError::Overlap { .. }));

        // Same layout is accepted when overlap checking is off
        let unchecked = GeometryDescription {
            check_overlaps: false,
            ..description
        };
        assert!(GeometryModel::from_description(&unchecked).is_ok());
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let description = GeometryDescription {
            name: "dupes".to_string(),
            description: None,
            world: WorldDescription::default(),
            volumes: vec![detector_box("a", -200.0), detector_box("a", 200.0)],
            check_overlaps: true,
        };
        let err = GeometryModel::from_description(&description).unwrap_err();
        assert!(matches!(err, GeometryError::DuplicatePlacement { copy_number: 0, .. }));
    }

    #[test]
    fn test_same_identity_under_different_mothers() {
        let mut module_a = detector_box("ModuleA", -200.0);
        module_a.children.push(detector_box("Pixel", 0.0));
        module_a.children[0].solid = Shape::cuboid(10.0, 10.0, 10.0);
        let mut module_b = detector_box("ModuleB", 200.0);
        module_b.children.push(module_a.children[0].clone());
        let description = GeometryDescription {
            name: "modules".to_string(),
            description: None,
            world: WorldDescription::default(),
            volumes: vec![module_a, module_b],
            check_overlaps: true,
        };
        let model = GeometryModel::from_description(&description).unwrap();
        let pixels: Vec<_> = model
            .iter_preorder()
            .filter(|(_, v)| v.name == "Pixel")
            .map(|(id, _)| id)
            .collect();
        assert_eq!(pixels.len(), 2);
        let pixel = model.find("Pixel", 0).unwrap();
        assert_eq!(pixel, pixels[0]);
        assert_eq!(model.get(pixel).unwrap().parent(), model.find("ModuleA", 0));
    }

    #[test]
    fn test_description_from_json_tags_sensitive() {
        let json = r#"{
            "name": "phantom",
            "world": {"half_x": 500, "half_y": 500, "half_z": 500},
            "volumes": [
                {
                    "name": "Phantom",
                    "solid": {"type": "box", "half_x": 150, "half_y": 150, "half_z": 150},
                    "material": "G4_WATER",
                    "children": [
                        {
                            "name": "Insert",
                            "solid": {"type": "sphere", "outer_radius": 20},
                            "material": "G4_BONE_COMPACT_ICRU",
                            "auxiliary": [{"type": "SensDet", "value": "InsertSD"}]
                        }
                    ]
                },
                {
                    "name": "Monitor",
                    "solid": {"type": "cylinder", "outer_radius": 30, "half_z": 5},
                    "material": "G4_Si",
                    "position": {"z": 300},
                    "is_sensitive": true
                }
            ]
        }"#;
        let description: GeometryDescription = serde_json::from_str(json).unwrap();
        assert!(description.check_overlaps);
        let model = GeometryModel::from_description(&description).unwrap();
        let sensitive: Vec<_> = model
            .iter_preorder()
            .filter(|(_, v)| v.sensitive)
            .map(|(_, v)| v.name.clone())
            .collect();
        assert_eq!(sensitive, vec!["Insert", "Monitor"]);
        let insert = model.find("Insert", 0).unwrap();
        assert_eq!(model.get(insert).unwrap().parent(), model.find("Phantom", 0));
    }

    #[test]
    fn test_empty_description_rejected() {
        let description = GeometryDescription {
            name: "empty".to_string(),
            description: None,
            world: WorldDescription::default(),
            volumes: Vec::new(),
            check_overlaps: true,
        };
        assert!(matches!(
            GeometryModel::from_description(&description),
            Err(GeometryError::Empty)
        ));
    }

    #[test]
    fn test_geometry_config_parses_parametric() {
        let json = r#"{"kind": "parametric", "chambers": 3}"#;
        let config: GeometryConfig = serde_json::from_str(json).unwrap();
        match &config {
            GeometryConfig::Parametric(cfg) => {
                assert_eq!(cfg.chambers, 3);
                assert_eq!(cfg.chamber_spacing, 800.0);
            }
            _ => panic!("Expected parametric geometry"),
        }
        let model = GeometryModel::build(&config).unwrap();
        assert_eq!(model.len(), 6);
    }

    #[test]
    fn test_known_materials() {
        assert!(is_known_material("G4_Xe"));
        assert!(!is_known_material("Unobtainium"));
    }
}
