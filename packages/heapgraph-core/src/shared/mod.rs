//! Shared models and constants

pub mod constants;
pub mod models;
