pub mod grid;
pub mod volume;
