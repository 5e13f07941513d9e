//! Shared test utilities for callscore integration tests.
//!
//! This module provides:
//! - `TestHarness` for an isolated orchestrator with a temp data directory
//! - Fake gateways, in-process (`ScriptedGateway`) and over HTTP (`spawn_gateway`)

pub mod gateways;
pub mod harness;

pub use gateways::*;
pub use harness::{settle, TestHarness};
