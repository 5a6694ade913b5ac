//! Run configuration, loadable from a single JSON file.
//!
//! Nothing here is global: the binary (or an embedding program) loads a
//! [`SimulationConfig`] once and hands its parts to the geometry builder, the
//! run manager and the output sink.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::geometry::GeometryConfig;
use crate::settings::RunSettings;
use crate::tallies::{H1Booking, H2Booking, Ntuple, Quantity};

/// What the analysis sink books and where it writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub output_dir: PathBuf,
    /// Prefix of every file written for a run
    pub file_stem: String,
    pub ntuple: Ntuple,
    pub h1: Vec<H1Booking>,
    pub h2: Vec<H2Booking>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_stem: "edep".to_string(),
            ntuple: Ntuple::default(),
            h1: vec![
                H1Booking {
                    name: "Edep".to_string(),
                    title: "Energy deposit in detector".to_string(),
                    quantity: Quantity::Edep,
                    bins: 100,
                    min: 0.0,
                    max: 10.0,
                    unit: "MeV".to_string(),
                },
                H1Booking {
                    name: "PosZ".to_string(),
                    title: "Hit position Z".to_string(),
                    quantity: Quantity::PosZ,
                    bins: 100,
                    min: -500.0,
                    max: 500.0,
                    unit: "mm".to_string(),
                },
            ],
            h2: vec![H2Booking {
                name: "PosXY".to_string(),
                title: "Hit position XY".to_string(),
                x: Quantity::PosX,
                x_bins: 100,
                x_min: -200.0,
                x_max: 200.0,
                y: Quantity::PosY,
                y_bins: 100,
                y_min: -200.0,
                y_max: 200.0,
            }],
        }
    }
}

/// Geometry, run control and analysis settings for one invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub geometry: GeometryConfig,
    pub run: RunSettings,
    pub analysis: AnalysisConfig,
}

impl SimulationConfig {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("<unprintable config: {}>", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ChamberTrackerConfig;

    #[test]
    fn test_default_bookings() {
        let analysis = AnalysisConfig::default();
        let names: Vec<&str> = analysis.h1.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Edep", "PosZ"]);
        assert_eq!(analysis.h1[0].bins, 100);
        assert_eq!(analysis.h1[1].min, -500.0);
        assert_eq!(analysis.h2[0].name, "PosXY");
        assert_eq!(analysis.h2[0].x_bins * analysis.h2[0].y_bins, 10_000);
        assert_eq!(analysis.ntuple.name, "hits");
    }

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = SimulationConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(
            config.geometry,
            GeometryConfig::Parametric(ChamberTrackerConfig::default())
        );
    }

    #[test]
    fn test_partial_json_overrides() {
        let text = r#"{
            "run": {"events": 250, "workers": 3},
            "analysis": {"file_stem": "b2a", "h2": []}
        }"#;
        let config = SimulationConfig::from_json_str(text).unwrap();
        assert_eq!(config.run.events, 250);
        assert_eq!(config.run.workers, 3);
        assert_eq!(config.analysis.file_stem, "b2a");
        assert!(config.analysis.h2.is_empty());
        assert_eq!(config.analysis.h1.len(), 2);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = SimulationConfig::from_json_file("/nonexistent/run.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.json"));
    }

    #[test]
    fn test_pretty_json_round_trips() {
        let config = SimulationConfig::default();
        let back = SimulationConfig::from_json_str(&config.to_json_pretty()).unwrap();
        assert_eq!(back, config);
    }
}
