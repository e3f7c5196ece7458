pub mod config;
pub mod context;
pub mod discretization;
pub mod field;
pub mod models;
pub mod numerics;
pub mod physics;
pub mod processing;
