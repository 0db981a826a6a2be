//! Kernel implementations: one file per kernel form.

pub mod function;
pub mod subprocess;
