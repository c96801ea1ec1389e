//! # Goal
//! A growable array that keeps allocation of memory and construction of
//! elements as two separate steps, so that capacity can be bought ahead of
//! time without paying for elements, and so that every step which runs user
//! code can be rolled back.
//!
//! # Features
//! - Memory management, through [`RawMemory`].
//!      - Responsible for: Do bytes for N slots exist? Never for: Is there a `T` in a slot?
//! - Element management, through [`Vector`].
//!      - Responsible for: Which slots hold a constructed `T`? (In pointer terms: `[0, len)`.)
//!      - Responsible for: What is left behind if a constructor panics?
//!
//! # Architecture
//! - [`RawMemory`] owns a fixed capacity block. Growth allocates a new block and
//!   swaps ownership, the block itself is never resized.
//! - [`Vector`] owns exactly one block and the elements in it. Anything that
//!   can panic builds into the new or spare slots first and commits last.
//! - [`VectorError`] reports allocation failures from the `try_*` family.
//!
//! ```
//! use raw_vector::Vector;
//!
//! let mut vector = Vector::new();
//! vector.push_back(1);
//! vector.push_back(2);
//! vector.push_back(3);
//! assert_eq!(vector, [1, 2, 3]);
//!
//! let next = vector.erase(1);
//! assert_eq!(vector[next], 3);
//! ```

//? Important decisions:
//? - Elements are relocated bitwise, Rust moves can't fail so there is no
//?   copy fallback during reallocation.
//? - Indexing through safe API is always bounds checked, out of range is a panic.
//?   Unchecked access is available through the slice API.
//? - In-place `emplace` builds the element before shifting the tail. The shift
//?   itself has no rollback, but being a bitwise move it can't fail.

pub mod collections;
pub mod core;

pub use crate::collections::Vector;
pub use crate::core::{RawMemory, TypeInfo, VectorError};
