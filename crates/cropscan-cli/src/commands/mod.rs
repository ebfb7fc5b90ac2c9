//! Command implementations for cropscan

pub mod analyze;

pub use analyze::analyze;
