use glam::DVec3;
use serde::Serialize;

/// One electrically addressable contact on the lead.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectrodeContact {
    /// Centre in mm, same frame as the conductivity volume.
    pub position: DVec3,
    /// mm
    pub radius: f64,
    /// mm
    pub height: f64,
    /// Ohm
    pub impedance: f64,
    pub is_active: bool,
    /// Signed current in mA; 0 while inactive.
    pub amplitude: f64,
}

impl ElectrodeContact {
    pub fn new(position: DVec3, radius: f64, height: f64, impedance: f64) -> Self {
        Self {
            position,
            radius,
            height,
            impedance,
            is_active: false,
            amplitude: 0.0,
        }
    }

    /// Lateral area of the cylindrical contact [mm^2].
    pub fn lateral_area(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.radius * self.height
    }
}

/// Read-only view of a contact for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactDescriptor {
    pub id: usize,
    pub position: [f64; 3],
    pub radius: f64,
    pub height: f64,
    pub is_active: bool,
    pub impedance: f64,
    pub amplitude: f64,
}

impl ContactDescriptor {
    pub(crate) fn from_contact(id: usize, c: &ElectrodeContact) -> Self {
        Self {
            id,
            position: c.position.to_array(),
            radius: c.radius,
            height: c.height,
            is_active: c.is_active,
            impedance: c.impedance,
            amplitude: c.amplitude,
        }
    }
}

/// A point current source handed to the field solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurrentSource {
    /// mm
    pub position: DVec3,
    /// mA, signed
    pub amplitude: f64,
}

impl CurrentSource {
    pub fn new(position: DVec3, amplitude: f64) -> Self {
        Self {
            position,
            amplitude,
        }
    }
}
