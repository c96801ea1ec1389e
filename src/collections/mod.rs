mod guard;
mod vector;

pub use vector::*;
