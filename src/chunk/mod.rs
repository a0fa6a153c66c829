//! Structured content model for assistant output.
//!
//! A raw (possibly still-arriving) model output string is parsed into an
//! ordered list of typed [`Chunk`] values, and successive parses are diffed
//! by the reconciler so a renderer can update stable prefix content in
//! place instead of rebuilding it on every streaming tick.

pub mod model;
pub mod parser;
pub mod reconcile;

pub use model::{Chunk, ChunkKind, render_all};
pub use parser::parse;
pub use reconcile::{Op, reconcile};
