//! triplog-core - Core library for Triplog
//!
//! The trip data synchronization engine: the durable local record store,
//! the running-trip accumulator, and the single-flight upload scheduler
//! shared by all Triplog front ends.

pub mod accumulator;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod models;
pub mod recorder;
pub mod sync;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use models::{Trip, TripGuid, TripStatus};
