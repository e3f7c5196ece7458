//! Discretisation of `div(sigma grad V) = S` on the voxel grid.

pub mod bc;
pub mod operator;
pub mod source;
