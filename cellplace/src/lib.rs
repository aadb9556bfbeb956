//! Hierarchical layout placement.
//!
//! Designs hold geometry, ports, and placed instances of other designs.
//! Instances carry an affine transformation, and their ports are derived
//! from the template design's ports on every access.

pub mod config;
pub mod deps;
pub mod error;
pub mod layout;
pub mod validation;

pub(crate) mod log;

pub use config::LibraryConfig;
pub use error::{CellplaceError, ErrorSource, Result};
pub use layout::context::Library;
pub use layout::design::Design;
pub use layout::instance::{Instance, InstanceOpts};
pub use layout::placement::{Anchor, PortRef};
pub use layout::port::{Port, PortType};
pub use layout::scratch::ScratchArena;
