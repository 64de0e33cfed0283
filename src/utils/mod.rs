//! Utility functions
//!
//! Provides logging setup and endpoint validation.

pub mod logging;
pub mod validation;
