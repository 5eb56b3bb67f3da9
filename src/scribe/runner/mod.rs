// SPDX-License-Identifier: MIT

//! Runner - executes a workflow one node at a time
//!
//! - [cache] - accepted outputs for the current run
//! - [prompt] - block resolution and prompt assembly
//! - [observer] - progress callbacks and human review
//! - [engine] - the generate / evaluate / decide loop

pub mod cache;
pub mod engine;
pub mod observer;
pub mod prompt;

pub use engine::{Engine, RunReport};
pub use observer::{CliObserver, HumanDecision, LogObserver, NoopObserver, WorkflowObserver};
