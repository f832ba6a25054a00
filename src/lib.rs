//! GrImage: an image composition core built around a sparse guide grid.
//!
//! Content is positioned by reference to user-placed guide lines rather than
//! fixed pixel coordinates, so layouts survive canvas resizes.  Bitmap layers
//! carry a 4-connected bucket fill.

pub mod canvas;
pub mod cli;
pub mod fill;
pub mod grid;
pub mod io;
pub mod layers;
pub mod logger;
pub mod region;
pub mod scene;
pub mod settings;
