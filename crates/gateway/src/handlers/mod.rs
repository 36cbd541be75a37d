//! API handlers module

pub mod catalog;
pub mod enrichment;
pub mod health;
