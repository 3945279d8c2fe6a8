//! Flash protocol command sequences

mod spi25;

pub use spi25::*;
