// src/pipeline/mod.rs

//! Shell-style `a | b | c` chains of processes.

mod builder;
mod running;

pub use builder::{Pipe, Pipeline, Step};
pub use running::RunningPipeline;
