//! Host shading language backends

pub mod msl;
