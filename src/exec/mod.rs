// src/exec/mod.rs

//! Execution machinery shared by processes, pipelines and pools.
//!
//! A launched child is owned by a [`supervisor`] task which reaps it,
//! enforces its timeout and publishes the final result. Stream [`pump`]s
//! copy child output into captures, console echo and line handlers.

pub(crate) mod cancel;
pub(crate) mod launch;
pub(crate) mod platform;
pub(crate) mod pump;
pub(crate) mod supervisor;
