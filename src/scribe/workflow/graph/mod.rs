// SPDX-License-Identifier: MIT

//! Dependency graph validation and ordering
//!
//! This module turns a node map into the order the engine runs nodes in.

mod scheduler;

pub use scheduler::build;
