//! Local filesystem storage for ingested media.

mod atomic;

pub use atomic::{write_atomic, WrittenFile};
