//! APIs for building and placing layout designs.

pub mod context;
pub mod design;
pub mod instance;
pub mod kernel;
pub mod layers;
pub mod placement;
pub mod port;
pub mod scratch;
pub mod validation;
