//! Numerical helpers shared by the EM steps

pub mod math;

pub use math::*;
