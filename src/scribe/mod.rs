// SPDX-License-Identifier: MIT

pub mod agent;
pub mod config;
pub mod runner;
pub mod workflow;
