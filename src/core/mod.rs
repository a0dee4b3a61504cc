//! Core support functionality
//!
//! Currently this holds the logging abstraction; everything protocol-specific
//! lives in the other top-level modules.

pub mod logging;
