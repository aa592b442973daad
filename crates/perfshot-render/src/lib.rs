//! # Perfshot Render
//!
//! Turns a finished trace into a flame graph with a three-stage external
//! pipeline:
//!
//! ```text
//! script -i <trace> | collapse | flamegraph > <output>
//! ```
//!
//! The stages are connected with OS pipes; no shell is involved.

pub mod pipeline;
pub mod renderer;

pub use pipeline::RenderPipeline;
pub use renderer::{GraphRenderer, RenderedGraph};
