//! Re-exports of dependencies that appear in public APIs.

pub use arcstr;
pub use placegeom;
