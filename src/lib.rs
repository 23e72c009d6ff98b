pub mod coverage;
pub mod error;
pub mod geo;
pub mod io;
pub mod physics;
pub mod render;
pub mod terrain;


pub use error::{Result, ViewshedError};
pub use io::{OutputMode, RunParams};
pub use physics::viewshed::{Viewshed, ViewshedEngine};
