mod args;
mod driver;
pub mod records;

pub use args::*;
pub use driver::{ListOutcome, MZIsoGrouper, MZIsoGrouperError};
