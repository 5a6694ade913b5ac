use log::info;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::geometry::GeometryModel;
use crate::volume::VolumeId;

/// Dense detector identifier, assigned in pre-order visit order from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DetectorId(pub u32);

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One sensitive placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitiveEntry {
    pub detector_id: DetectorId,
    pub volume: VolumeId,
    pub name: String,
    pub copy_number: u32,
    /// Hits collection name, `{name}_HC`
    pub collection_name: String,
}

/// Mapping from sensitive volumes to detector ids.
///
/// Built once from an immutable `GeometryModel` and shared read-only between
/// workers afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitiveIndex {
    entries: Vec<SensitiveEntry>,
    by_volume: Vec<Option<DetectorId>>,
    by_identity: HashMap<(String, u32), DetectorId>,
}

impl SensitiveIndex {
    /// Walk the tree in pre-order and register every volume flagged sensitive.
    pub fn discover(model: &GeometryModel) -> Self {
        let mut entries = Vec::new();
        let mut by_volume = vec![None; model.len()];
        let mut by_identity = HashMap::new();

        for (volume_id, volume) in model.iter_preorder() {
            if !volume.sensitive {
                continue;
            }
            let detector_id = DetectorId(entries.len() as u32);
            by_volume[volume_id.0] = Some(detector_id);
            by_identity
                .entry((volume.name.clone(), volume.copy_number))
                .or_insert(detector_id);
            entries.push(SensitiveEntry {
                detector_id,
                volume: volume_id,
                name: volume.name.clone(),
                copy_number: volume.copy_number,
                collection_name: format!("{}_HC", volume.name),
            });
            info!(
                "  Sensitive detector: {} -> id {}",
                volume.label(),
                detector_id
            );
        }
        info!("Found {} sensitive volumes", entries.len());

        Self {
            entries,
            by_volume,
            by_identity,
        }
    }

    pub fn detector_id(&self, volume: VolumeId) -> Option<DetectorId> {
        self.by_volume.get(volume.0).copied().flatten()
    }

    pub fn is_sensitive(&self, volume: VolumeId) -> bool {
        self.detector_id(volume).is_some()
    }

    /// Detector for a (name, copy number) identity. Identities repeated under
    /// different mothers resolve to the first one in pre-order.
    pub fn lookup(&self, name: &str, copy_number: u32) -> Option<DetectorId> {
        self.by_identity
            .get(&(name.to_string(), copy_number))
            .copied()
    }

    pub fn entry(&self, id: DetectorId) -> Option<&SensitiveEntry> {
        self.entries.get(id.0 as usize)
    }

    /// Entries in detector id order.
    pub fn entries(&self) -> &[SensitiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ChamberTrackerConfig, GeometryDescription, GeometryModel};

    #[test]
    fn test_chambers_get_dense_ids() {
        let model = GeometryModel::chamber_tracker(&ChamberTrackerConfig::default()).unwrap();
        let index = SensitiveIndex::discover(&model);
        assert_eq!(index.len(), 5);
        for (k, entry) in index.entries().iter().enumerate() {
            assert_eq!(entry.detector_id, DetectorId(k as u32));
            assert_eq!(entry.copy_number, k as u32);
            assert_eq!(entry.collection_name, "Chamber_HC");
            assert_eq!(index.lookup("Chamber", k as u32), Some(entry.detector_id));
        }
    }

    #[test]
    fn test_non_sensitive_volumes_have_no_entry() {
        let model = GeometryModel::chamber_tracker(&ChamberTrackerConfig::default()).unwrap();
        let index = SensitiveIndex::discover(&model);
        for (id, volume) in model.iter_preorder() {
            assert_eq!(index.is_sensitive(id), volume.sensitive);
        }
        assert!(index.lookup("Target", 0).is_none());
        assert!(index.detector_id(model.root()).is_none());
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let model = GeometryModel::chamber_tracker(&ChamberTrackerConfig::default()).unwrap();
        let first = SensitiveIndex::discover(&model);
        let second = SensitiveIndex::discover(&model);
        assert_eq!(first, second);
    }

    #[test]
    fn test_repeated_identity_gets_separate_detectors() {
        let json = r#"{
            "name": "modules",
            "volumes": [
                {
                    "name": "ModuleA",
                    "solid": {"type": "box", "half_x": 50, "half_y": 50, "half_z": 50},
                    "material": "G4_AIR",
                    "position": {"z": -200},
                    "children": [{
                        "name": "Pixel",
                        "solid": {"type": "box", "half_x": 10, "half_y": 10, "half_z": 10},
                        "material": "G4_Si",
                        "is_sensitive": true
                    }]
                },
                {
                    "name": "ModuleB",
                    "solid": {"type": "box", "half_x": 50, "half_y": 50, "half_z": 50},
                    "material": "G4_AIR",
                    "position": {"z": 200},
                    "children": [{
                        "name": "Pixel",
                        "solid": {"type": "box", "half_x": 10, "half_y": 10, "half_z": 10},
                        "material": "G4_Si",
                        "is_sensitive": true
                    }]
                }
            ]
        }"#;
        let description: GeometryDescription = serde_json::from_str(json).unwrap();
        let model = GeometryModel::from_description(&description).unwrap();
        let index = SensitiveIndex::discover(&model);
        assert_eq!(index.len(), 2);
        assert_ne!(index.entries()[0].volume, index.entries()[1].volume);
        assert_eq!(index.lookup("Pixel", 0), Some(DetectorId(0)));
        assert_eq!(
            index.detector_id(index.entries()[1].volume),
            Some(DetectorId(1))
        );
    }

    #[test]
    fn test_tracker_without_chambers_is_empty() {
        let cfg = ChamberTrackerConfig {
            chambers: 0,
            ..Default::default()
        };
        let model = GeometryModel::chamber_tracker(&cfg).unwrap();
        let index = SensitiveIndex::discover(&model);
        assert!(index.is_empty());
    }
}
