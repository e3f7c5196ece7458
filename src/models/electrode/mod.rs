//! Stimulation lead: contact geometry and activation state.

pub mod array;
pub mod contact;

pub use array::{ElectrodeArray, ElectrodeError, ElectrodeKind, GeometrySnapshot, StimulationMode};
pub use contact::{ContactDescriptor, CurrentSource, ElectrodeContact};
