pub mod document;
pub mod error;
pub mod expand;
pub mod harmonize;
pub mod io;
pub mod model;
pub mod run;

pub use error::{LaborerError, Result};
