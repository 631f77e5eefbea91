// src/pool/mod.rs

//! Bounded-concurrency execution of independent processes.
//!
//! Members are ordered once by a [`Strategy`], queued, and pulled by a
//! fixed number of worker tasks. A collector gathers exactly one result per
//! member into a key → result map.

mod builder;
mod running;
pub mod strategy;

pub use builder::{Pool, PoolBuilder, PoolCommand};
pub use running::RunningPool;
pub use strategy::{execution_order, Fifo, PriorityFirst, Schedulable, ShortestTimeoutFirst, Strategy};
