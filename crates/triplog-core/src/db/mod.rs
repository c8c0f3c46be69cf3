//! Database layer for Triplog

mod connection;
mod migrations;
mod trip_repository;
mod user_repository;

pub use connection::Database;
pub use trip_repository::{SqliteTripStore, TripFilter, TripStore};
pub use user_repository::{SqliteUserStore, UserStore};
