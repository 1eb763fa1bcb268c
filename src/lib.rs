//! Meridian holds the numerical engines of a block-structured astrophysics
//! code that are more than a formula evaluated per cell: the parallel
//! checkpoint writer and its reader, a spectral surface grid on the
//! 2-sphere, and an apparent horizon finder built on that grid. Smaller
//! collaborators (mesh topology, field buffers, the input deck, message
//! passing between ranks, and the finite-element angular basis of the
//! radiation solver) live alongside them.

pub mod femn;
pub mod field;
pub mod horizon;
pub mod index_space;
pub mod mesh;
pub mod message;
pub mod parameters;
pub mod physics;
pub mod restart;
pub mod rng;
pub mod sphere;
pub mod tensor;
