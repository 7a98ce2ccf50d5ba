//! Access and submission rules.

pub mod access;
pub mod submission;
