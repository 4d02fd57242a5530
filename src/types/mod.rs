//! Core domain types shared across the gate.

pub mod ids;

pub use ids::EventId;
