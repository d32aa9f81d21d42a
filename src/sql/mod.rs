//! Safe SQL builder: identifiers from config only, values as parameters.

mod builder;
mod compile;
pub mod params;

pub use builder::*;
pub use compile::{QueryKind, SqlCompiler};
pub use params::*;
