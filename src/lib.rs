//! Spotshare core library
//!
//! Client-side policy layer for sharing parking spots and live
//! locations over a hosted database-and-auth service. Exposes modules
//! for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
