use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::volume::VolumeId;

/// Kinematic state at one end of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPoint {
    pub position: Vector3<f64>,
    pub momentum: Vector3<f64>,
    pub kinetic_energy: f64,
    pub global_time: f64,
    pub local_time: f64,
}

impl StepPoint {
    pub fn new(position: Vector3<f64>, momentum: Vector3<f64>, kinetic_energy: f64) -> Self {
        Self {
            position,
            momentum,
            kinetic_energy,
            global_time: 0.0,
            local_time: 0.0,
        }
    }

    pub fn at_time(mut self, global_time: f64, local_time: f64) -> Self {
        self.global_time = global_time;
        self.local_time = local_time;
        self
    }
}

/// One transport step as reported by the transport engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub track_id: i32,
    pub parent_id: i32,
    pub particle: String,
    pub pdg_code: i32,
    pub pre: StepPoint,
    pub post: StepPoint,
    /// Total energy deposited along the step (MeV)
    pub energy_deposit: f64,
    pub process: Option<String>,
    /// Volume the pre-step point lies in
    pub volume: VolumeId,
    pub copy_number: u32,
}

impl StepInfo {
    /// A primary-track step at rest in `volume`, mostly for driving collectors directly.
    pub fn deposit(volume: VolumeId, copy_number: u32, energy_deposit: f64) -> Self {
        let point = StepPoint::new(Vector3::zeros(), Vector3::zeros(), 0.0);
        Self {
            track_id: 1,
            parent_id: 0,
            particle: "geantino".to_string(),
            pdg_code: 0,
            pre: point.clone(),
            post: point,
            energy_deposit,
            process: None,
            volume,
            copy_number,
        }
    }

    pub fn step_length(&self) -> f64 {
        (self.post.position - self.pre.position).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_step_construction() {
        let step = StepInfo::deposit(VolumeId(3), 2, 1.5);
        assert_eq!(step.volume, VolumeId(3));
        assert_eq!(step.copy_number, 2);
        assert_eq!(step.energy_deposit, 1.5);
        assert_eq!(step.track_id, 1);
        assert_eq!(step.step_length(), 0.0);
    }

    #[test]
    fn test_step_length() {
        let mut step = StepInfo::deposit(VolumeId(0), 0, 0.0);
        step.pre = StepPoint::new(Vector3::new(0.0, 0.0, 0.0), Vector3::zeros(), 10.0);
        step.post = StepPoint::new(Vector3::new(3.0, 4.0, 0.0), Vector3::zeros(), 9.0).at_time(1.0, 1.0);
        assert_eq!(step.step_length(), 5.0);
        assert_eq!(step.post.global_time, 1.0);
    }
}
