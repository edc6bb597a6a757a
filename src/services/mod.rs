//! Business logic services.

pub mod allocation;
pub mod consumer;
pub mod format;
pub mod pattern;
