use glam::DVec3;
use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::contact::{ContactDescriptor, CurrentSource, ElectrodeContact};

// Lead dimensions of a standard quadripolar DBS electrode [mm].
pub const LEAD_DIAMETER: f64 = 1.27;
pub const CONTACT_HEIGHT: f64 = 1.5;
pub const CONTACT_SPACING: f64 = 0.5;

/// Default per-contact current [mA].
pub const DEFAULT_AMPLITUDE: f64 = 2.0;

const RING_BASE_IMPEDANCE: f64 = 1000.0;
const SEGMENT_IMPEDANCE_MEAN: f64 = 800.0;
const SEGMENT_IMPEDANCE_STD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectrodeKind {
    /// Four ring contacts.
    Quadripolar,
    /// Four tip rings followed by segmented contacts.
    Directional,
}

impl ElectrodeKind {
    pub fn contact_count(self) -> usize {
        match self {
            ElectrodeKind::Quadripolar => 4,
            ElectrodeKind::Directional => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulationMode {
    Monopolar,
    Bipolar,
    Multipolar,
}

#[derive(Debug, Error, PartialEq)]
pub enum ElectrodeError {
    #[error("electrode orientation must be a finite non-zero vector, got {0:?}")]
    DegenerateOrientation([f64; 3]),
    #[error("electrode tip position must be finite, got {0:?}")]
    InvalidTip([f64; 3]),
}

/// Lead-level description plus every contact, for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometrySnapshot {
    pub kind: ElectrodeKind,
    pub tip: [f64; 3],
    pub orientation: [f64; 3],
    pub mode: StimulationMode,
    pub active_contacts: Vec<usize>,
    pub amplitudes: Vec<f64>,
    pub contacts: Vec<ContactDescriptor>,
}

/// Multi-contact stimulation lead.
///
/// Geometry is fixed at construction. The stimulation configuration is plain
/// mutable state; callers sharing an array across threads must serialise
/// configuration changes themselves.
#[derive(Debug, Clone)]
pub struct ElectrodeArray {
    kind: ElectrodeKind,
    tip: DVec3,
    orientation: DVec3,
    contacts: Vec<ElectrodeContact>,
    mode: StimulationMode,
    active: Vec<usize>,
    amplitudes: Vec<f64>,
}

impl ElectrodeArray {
    /// Lay out the contacts of `kind` from the tip along `orientation`.
    ///
    /// `seed` drives the segmented-contact impedance draws. The new array is
    /// configured monopolar on contact 0 at [`DEFAULT_AMPLITUDE`].
    pub fn build(
        kind: ElectrodeKind,
        tip: DVec3,
        orientation: DVec3,
        seed: u64,
    ) -> Result<Self, ElectrodeError> {
        if !tip.is_finite() {
            return Err(ElectrodeError::InvalidTip(tip.to_array()));
        }
        let orientation = orientation
            .try_normalize()
            .ok_or(ElectrodeError::DegenerateOrientation(orientation.to_array()))?;

        let mut rng = StdRng::seed_from_u64(seed);
        let contacts = match kind {
            ElectrodeKind::Quadripolar => ring_contacts(tip, orientation),
            ElectrodeKind::Directional => directional_contacts(tip, orientation, &mut rng),
        };

        let mut array = Self {
            kind,
            tip,
            orientation,
            contacts,
            mode: StimulationMode::Monopolar,
            active: Vec::new(),
            amplitudes: Vec::new(),
        };
        array.set_stimulation_configuration(StimulationMode::Monopolar, &[0], None);
        Ok(array)
    }

    /// Replace the stimulation configuration and return the resolved amplitudes.
    ///
    /// Indices outside the array are ignored, as are repeats of an index already
    /// activated. `amplitudes[n]` belongs to `active_indices[n]`. Without explicit
    /// amplitudes, monopolar drives every requested contact at
    /// [`DEFAULT_AMPLITUDE`] and bipolar uses the fixed `[+2, -2]` mA pair;
    /// multipolar has no default. Missing amplitudes are filled with 0 mA.
    ///
    /// Padding keeps every requested contact active, with a warning, where a
    /// plain pairwise zip would truncate the active list to the amplitudes.
    /// A padded contact stays in the configuration but injects no current.
    pub fn set_stimulation_configuration(
        &mut self,
        mode: StimulationMode,
        active_indices: &[usize],
        amplitudes: Option<&[f64]>,
    ) -> &[f64] {
        let requested: Vec<f64> = match amplitudes {
            Some(a) => a.to_vec(),
            None => match mode {
                StimulationMode::Monopolar => vec![DEFAULT_AMPLITUDE; active_indices.len()],
                StimulationMode::Bipolar => vec![DEFAULT_AMPLITUDE, -DEFAULT_AMPLITUDE],
                StimulationMode::Multipolar => Vec::new(),
            },
        };

        for contact in &mut self.contacts {
            contact.is_active = false;
            contact.amplitude = 0.0;
        }

        let mut active = Vec::with_capacity(active_indices.len());
        let mut resolved = Vec::with_capacity(active_indices.len());
        let mut missing = 0usize;
        for (slot, &idx) in active_indices.iter().enumerate() {
            if idx >= self.contacts.len() || active.contains(&idx) {
                continue;
            }
            let amplitude = requested.get(slot).copied().unwrap_or_else(|| {
                missing += 1;
                0.0
            });
            let contact = &mut self.contacts[idx];
            contact.is_active = true;
            contact.amplitude = amplitude;
            active.push(idx);
            resolved.push(amplitude);
        }

        if missing > 0 {
            warn!(
                "{} active contact(s) had no amplitude in {:?} mode, driven at 0 mA",
                missing, mode
            );
        }

        self.mode = mode;
        self.active = active;
        self.amplitudes = resolved;
        &self.amplitudes
    }

    pub fn kind(&self) -> ElectrodeKind {
        self.kind
    }

    pub fn tip(&self) -> DVec3 {
        self.tip
    }

    pub fn orientation(&self) -> DVec3 {
        self.orientation
    }

    pub fn mode(&self) -> StimulationMode {
        self.mode
    }

    pub fn contacts(&self) -> &[ElectrodeContact] {
        &self.contacts
    }

    pub fn active_contacts(&self) -> &[usize] {
        &self.active
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    /// Position and current of every active contact, in activation order.
    pub fn active_sources(&self) -> Vec<CurrentSource> {
        self.active
            .iter()
            .zip(&self.amplitudes)
            .map(|(&idx, &amp)| CurrentSource::new(self.contacts[idx].position, amp))
            .collect()
    }

    pub fn geometry_snapshot(&self) -> GeometrySnapshot {
        GeometrySnapshot {
            kind: self.kind,
            tip: self.tip.to_array(),
            orientation: self.orientation.to_array(),
            mode: self.mode,
            active_contacts: self.active.clone(),
            amplitudes: self.amplitudes.clone(),
            contacts: self
                .contacts
                .iter()
                .enumerate()
                .map(|(id, c)| ContactDescriptor::from_contact(id, c))
                .collect(),
        }
    }
}

fn ring_contacts(tip: DVec3, axis: DVec3) -> Vec<ElectrodeContact> {
    let radius = LEAD_DIAMETER / 2.0;
    (0..ElectrodeKind::Quadripolar.contact_count())
        .map(|i| {
            let centre = tip + axis * (i as f64 * (CONTACT_HEIGHT + CONTACT_SPACING));
            let mut contact = ElectrodeContact::new(centre, radius, CONTACT_HEIGHT, 0.0);
            contact.impedance = RING_BASE_IMPEDANCE / contact.lateral_area();
            contact
        })
        .collect()
}

fn directional_contacts<R: Rng>(tip: DVec3, axis: DVec3, rng: &mut R) -> Vec<ElectrodeContact> {
    let radius = LEAD_DIAMETER / 2.0;
    let height = CONTACT_HEIGHT * 0.7;
    let lateral = lateral_axis(axis);

    (0..ElectrodeKind::Directional.contact_count())
        .map(|i| {
            let (centre, r) = if i < 4 {
                (tip + axis * 0.5, radius)
            } else {
                let level = ((i - 4) / 3) as f64;
                let segment = ((i - 4) % 3) as f64;
                let angle = segment * 2.0 * std::f64::consts::PI / 3.0;
                let centre = tip
                    + axis * (1.5 + level * 2.0)
                    + lateral * (radius * 0.7 * angle.cos());
                (centre, radius * 0.6)
            };
            let z: f64 = rng.sample(StandardNormal);
            let impedance = (SEGMENT_IMPEDANCE_MEAN + SEGMENT_IMPEDANCE_STD * z).max(0.0);
            ElectrodeContact::new(centre, r, height, impedance)
        })
        .collect()
}

/// Unit vector perpendicular to the shaft, in the xy-plane when possible.
fn lateral_axis(axis: DVec3) -> DVec3 {
    DVec3::new(-axis.y, axis.x, 0.0)
        .try_normalize()
        .unwrap_or_else(|| axis.any_orthonormal_vector())
}
