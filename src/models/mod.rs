//! Domain models and DTOs for patterns, counters, and allocations.

pub mod allocation;
pub mod identifier_type;
pub mod pattern;
