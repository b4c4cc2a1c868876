mod abstractions;
mod facade;
mod real;

pub use abstractions::*;
pub(crate) use facade::*;
pub(crate) use real::BuildTargetMaskBindings;
