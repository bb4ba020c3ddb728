//! # Resona Geometry
//!
//! Spatial layer of the Resona framework. This crate provides:
//!
//! - **Voxel grids** ([`grid`]): Uniform cell-centred grids, refinement
//!   that keeps the far face of the domain fixed, and index boxes.
//! - **Interpolation** ([`interp`]): Nearest and trilinear remapping of
//!   complex fields between grids with an explicit out-of-domain policy.
//! - **Parametric primitives** ([`primitives`]): Spheres, slabs, cuboids,
//!   cylinders and ellipsoids describing inclusions in the medium.
//! - **Region masks** ([`mask`]): Voxelised primitives and box extraction.
//! - **Transformations** ([`transform`]): Rotations and translations used
//!   to steer transducers.

pub mod grid;
pub mod interp;
pub mod mask;
pub mod primitives;
pub mod transform;

pub use grid::{generate_grid, generate_grid_2d, refine_grid, GridError, GridManager, IndexBox, VoxelGrid};
pub use interp::{interpolate, remap, InterpolationMethod, OutOfDomain};
pub use mask::RegionMask;
pub use primitives::Primitive;
