//! Trip model

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Device-local trip row id. Not stable across devices.
pub type TripId = i64;

/// Globally unique trip identifier, assigned once at creation.
///
/// This is the real primary key shared with the server; the local row id is
/// an implementation detail of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripGuid(Uuid);

impl TripGuid {
    /// Create a new random guid.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the string representation of this guid
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for TripGuid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TripGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TripGuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Trip lifecycle status. Transitions are one-directional out of `Live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripStatus {
    /// Recording in progress
    Live,
    /// Recording finished and kept
    Finalized,
    /// Discarded (too short) or removed; the row is kept for sync history
    Deleted,
}

impl TripStatus {
    /// Integer encoding used in the database and on the wire.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Live => 1,
            Self::Finalized => 2,
            Self::Deleted => 3,
        }
    }

    /// Decode from the integer encoding.
    #[must_use]
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Live),
            2 => Some(Self::Finalized),
            3 => Some(Self::Deleted),
            _ => None,
        }
    }

    /// True once the trip has left `Live`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Live)
    }
}

impl Serialize for TripStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for TripStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Self::from_i64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid trip status {value}")))
    }
}

/// One recorded driving session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Device-local row id; 0 until the trip has been stored
    pub id: TripId,
    /// Cross-device identifier, immutable after creation
    pub guid: TripGuid,
    /// Start of recording (Unix ms)
    pub start_time: i64,
    /// Advances as traces arrive (Unix ms)
    pub end_time: i64,
    /// Accumulated great-circle distance in meters
    pub distance: f64,
    /// Driving score from the external accumulator, stored verbatim
    pub score: f64,
    /// Device tilt from the external accumulator, stored verbatim
    pub tilt: f64,
    pub status: TripStatus,
    /// Whether the trip *metadata* has reached the server; trace rows carry
    /// their own flags
    pub synced: bool,
    /// Owner email; empty for trips recorded before login
    pub owner: String,
}

impl Trip {
    /// Create a new live trip starting now.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp_millis())
    }

    /// Create a new live trip with the given start time.
    #[must_use]
    pub fn starting_at(start_time: i64) -> Self {
        Self {
            id: 0,
            guid: TripGuid::new(),
            start_time,
            end_time: start_time,
            distance: 0.0,
            score: 10.0,
            tilt: 0.0,
            status: TripStatus::Live,
            synced: false,
            owner: String::new(),
        }
    }

    /// Recording duration in milliseconds.
    #[must_use]
    pub const fn duration_ms(&self) -> i64 {
        self.end_time - self.start_time
    }

    /// True when the trip was recorded before any user logged in.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.owner.is_empty()
    }
}

impl Default for Trip {
    fn default() -> Self {
        Self::new()
    }
}

/// Sparse server-driven metadata correction. Only non-`None` fields are
/// applied; the guid is always required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPatch {
    pub guid: TripGuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TripStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_unique() {
        let a = TripGuid::new();
        let b = TripGuid::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_guid_parse_roundtrip() {
        let guid = TripGuid::new();
        let parsed: TripGuid = guid.as_str().parse().unwrap();
        assert_eq!(guid, parsed);
    }

    #[test]
    fn test_status_encoding_roundtrip() {
        for status in [TripStatus::Live, TripStatus::Finalized, TripStatus::Deleted] {
            assert_eq!(TripStatus::from_i64(status.as_i64()), Some(status));
        }
        assert_eq!(TripStatus::from_i64(0), None);
        assert_eq!(TripStatus::from_i64(42), None);
    }

    #[test]
    fn test_status_serializes_as_integer() {
        let json = serde_json::to_string(&TripStatus::Finalized).unwrap();
        assert_eq!(json, "2");
        let back: TripStatus = serde_json::from_str("3").unwrap();
        assert_eq!(back, TripStatus::Deleted);
        assert!(serde_json::from_str::<TripStatus>("7").is_err());
    }

    #[test]
    fn test_new_trip_defaults() {
        let trip = Trip::starting_at(1000);
        assert_eq!(trip.start_time, 1000);
        assert_eq!(trip.end_time, 1000);
        assert_eq!(trip.distance, 0.0);
        assert_eq!(trip.score, 10.0);
        assert_eq!(trip.status, TripStatus::Live);
        assert!(!trip.synced);
        assert!(trip.is_anonymous());
    }

    #[test]
    fn test_patch_parses_without_optional_fields() {
        let guid = TripGuid::new();
        let json = format!(r#"{{"guid":"{guid}"}}"#);
        let patch: TripPatch = serde_json::from_str(&json).unwrap();
        assert_eq!(patch.guid, guid);
        assert_eq!(patch.distance, None);
        assert_eq!(patch.status, None);
    }

    #[test]
    fn test_patch_requires_guid() {
        assert!(serde_json::from_str::<TripPatch>(r#"{"distance":12.0}"#).is_err());
    }
}
