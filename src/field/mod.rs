pub mod analyzer;
pub mod grid;
pub mod solver;

pub use grid::{ScalarGrid, VectorGrid};
pub use solver::{FieldSolver, PotentialSolution, SolveOptions, SolverCache};
