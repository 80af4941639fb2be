//! # Trellis
//!
//! Command-line front end for the `trellis-core` graph overlay.

pub mod cli;
pub mod config;
