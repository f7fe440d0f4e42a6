//! Utilities Module
//!
//! This module contains shared utility functionality for the DCS registry and its binaries.

pub mod error;
pub mod tracing;
