//! Fills the host listing form from a product record.

pub mod filler;
pub mod matching;
pub mod selectors;
pub mod upload;

pub use filler::{FillOptions, Filler};
pub use upload::{HttpImageSource, ImageSource};
