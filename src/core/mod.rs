mod error;
mod raw_memory;

pub use error::*;
pub use raw_memory::*;
