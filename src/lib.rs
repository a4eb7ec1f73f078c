//! Core library for the rust_toro toolchain.
//!
//! Turns parametric robot motion into controller program modules and drives the remote
//! session that uploads and runs them:
//!
//! - [`motion`]: targets, their literal text form, and speed/zone catalogs
//! - [`program`]: target compilation, instruction splicing, module assembly
//! - [`controller`]: scoped logon/mastership sessions and composed workflows
//! - [`tracking`]: pointer sample log and the target streaming window
//!
//! Configuration lives in [`config`], logging setup in [`telemetry`], and every fallible
//! operation returns [`error::AppResult`].

pub mod config;
pub mod controller;
pub mod error;
pub mod motion;
pub mod program;
pub mod telemetry;
pub mod tracking;

pub use config::ToroConfig;
pub use error::{AppResult, ErrorKind, ToroError};
