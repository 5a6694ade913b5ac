// Geometry loaded from a JSON description with explicit sensitive annotations

use std::fs;

use edep_tally::{
    GeometryConfig, GeometryError, GeometryModel, MemorySink, RunManager, RunSettings,
    SensitiveIndex, StepInfo, StepScorer, TransportEngine,
};

const DETECTOR: &str = r#"{
    "name": "two-layer",
    "world": {"half_x": 500.0, "half_y": 500.0, "half_z": 500.0, "material": "G4_Galactic"},
    "volumes": [
        {
            "name": "Absorber",
            "solid": {"type": "box", "half_x": 100.0, "half_y": 100.0, "half_z": 10.0},
            "material": "G4_Pb",
            "position": {"z": -100.0}
        },
        {
            "name": "Layer",
            "solid": {"type": "box", "half_x": 100.0, "half_y": 100.0, "half_z": 5.0},
            "material": "G4_Si",
            "copy_number": 0,
            "auxiliary": [{"type": "SensDet", "value": "LayerSD"}]
        },
        {
            "name": "Layer",
            "solid": {"type": "box", "half_x": 100.0, "half_y": 100.0, "half_z": 5.0},
            "material": "G4_Si",
            "copy_number": 1,
            "position": {"z": 100.0},
            "is_sensitive": true
        }
    ]
}"#;

struct LayerDeposits {
    geometry: GeometryModel,
}

impl TransportEngine for LayerDeposits {
    fn transport(&self, _event_id: u64, scorer: &mut dyn StepScorer) {
        let absorber = self.geometry.find("Absorber", 0).unwrap();
        scorer.on_step(&StepInfo::deposit(absorber, 0, 5.0));
        for copy in 0..2 {
            let layer = self.geometry.find("Layer", copy).unwrap();
            scorer.on_step(&StepInfo::deposit(layer, copy, 0.5));
        }
    }
}

#[test]
fn test_file_geometry_tags_annotated_volumes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("detector.json");
    fs::write(&path, DETECTOR).unwrap();

    let config = GeometryConfig::File { path };
    let geometry = GeometryModel::build(&config).unwrap();
    let index = SensitiveIndex::discover(&geometry);
    assert_eq!(index.len(), 2);
    assert_eq!(index.lookup("Layer", 0).map(|d| d.0), Some(0));
    assert_eq!(index.lookup("Layer", 1).map(|d| d.0), Some(1));
    assert!(index.lookup("Absorber", 0).is_none());
    assert_eq!(index.entries()[0].collection_name, "Layer_HC");
}

#[test]
fn test_run_over_described_geometry() {
    let description = serde_json::from_str(DETECTOR).unwrap();
    let config = GeometryConfig::Described(description);
    let mut manager = RunManager::build(
        &config,
        RunSettings {
            workers: 2,
            events: 6,
            ..RunSettings::default()
        },
    )
    .unwrap();
    let engine = LayerDeposits {
        geometry: GeometryModel::build(&config).unwrap(),
    };
    let mut sink = MemorySink::new();
    let stats = manager.run(&engine, &mut sink).unwrap();
    assert_eq!(stats.event_count, 6);
    assert!((stats.total_edep - 6.0).abs() < 1e-12);
    assert!(sink.events.iter().all(|s| s.hit_count == 2));
}

#[test]
fn test_overlapping_description_is_rejected() {
    let overlapping = DETECTOR.replace(r#""position": {"z": 100.0}"#, r#""position": {"z": 5.0}"#);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overlap.json");
    fs::write(&path, overlapping).unwrap();

    let err = GeometryModel::build(&GeometryConfig::File { path }).unwrap_err();
    assert!(matches!(err, GeometryError::Overlap { .. }));
}

#[test]
fn test_unreadable_description() {
    let err = GeometryModel::build(&GeometryConfig::File {
        path: "/nonexistent/detector.json".into(),
    })
    .unwrap_err();
    assert!(matches!(err, GeometryError::Io(_)));
}
