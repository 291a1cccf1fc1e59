//! Admission intake: record linkage, draft normalization, fee derivation, document handling
//! and guarded create-or-update submission for the institute console.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
