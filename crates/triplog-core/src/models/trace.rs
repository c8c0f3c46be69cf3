//! Trace model: one timestamped sensor event belonging to a trip.

use serde::{Deserialize, Serialize};

/// Device-local trace row id; the unit referenced when acknowledging sync.
pub type TraceId = i64;

/// A single GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Fix timestamp (Unix ms)
    pub time: i64,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
    /// Instantaneous speed in m/s
    pub speed: f64,
}

/// Periodic snapshot of the externally computed trip summary values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummarySnapshot {
    pub time: i64,
    pub tilt: f64,
    pub score: f64,
}

/// Raw accelerometer sample. Persisted and uploaded, never folded into the
/// running trip state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    pub time: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The serialized event value of one trace row.
///
/// Adjacently tagged so a message serializes to the wire shape
/// `{"type": "...", "payload": {...}}`; the same JSON is stored in the
/// trace table's value column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum TracePayload {
    Gps(GpsFix),
    Summary(SummarySnapshot),
    Accelerometer(AccelSample),
}

impl TracePayload {
    /// The discriminator stored in the trace table's type column.
    #[must_use]
    pub const fn kind(&self) -> TraceKind {
        match self {
            Self::Gps(_) => TraceKind::Gps,
            Self::Summary(_) => TraceKind::Summary,
            Self::Accelerometer(_) => TraceKind::Accelerometer,
        }
    }

    /// Event timestamp (Unix ms).
    #[must_use]
    pub const fn time(&self) -> i64 {
        match self {
            Self::Gps(fix) => fix.time,
            Self::Summary(snapshot) => snapshot.time,
            Self::Accelerometer(sample) => sample.time,
        }
    }
}

/// Trace type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Gps,
    Summary,
    Accelerometer,
}

impl TraceKind {
    /// The type considered essential enough to upload even under constrained
    /// (non-WiFi) connectivity.
    pub const VITAL: Self = Self::Gps;

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gps => "gps",
            Self::Summary => "summary",
            Self::Accelerometer => "accelerometer",
        }
    }

    #[must_use]
    pub const fn is_vital(self) -> bool {
        matches!(self, Self::VITAL)
    }
}

/// One trace row as stored and as echoed to the server. `rowid` is `None`
/// until the row has been persisted; on upload it is the acknowledgment key
/// the server echoes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMessage {
    #[serde(flatten)]
    pub payload: TracePayload,
    #[serde(rename = "rowId", default, skip_serializing_if = "Option::is_none")]
    pub rowid: Option<TraceId>,
}

impl TraceMessage {
    /// Wrap a payload that has not been persisted yet.
    #[must_use]
    pub const fn new(payload: TracePayload) -> Self {
        Self {
            payload,
            rowid: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_payload_wire_shape() {
        let message = TraceMessage {
            payload: TracePayload::Gps(GpsFix {
                time: 1500,
                lat: 43.07,
                lng: -89.40,
                speed: 12.5,
            }),
            rowid: Some(42),
        };

        let json: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "gps");
        assert_eq!(json["payload"]["lat"], 43.07);
        assert_eq!(json["rowId"], 42);
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = TracePayload::Summary(SummarySnapshot {
            time: 99,
            tilt: 0.2,
            score: 8.5,
        });
        let json = serde_json::to_string(&payload).unwrap();
        let back: TracePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload, back);
    }

    #[test]
    fn test_unstored_message_omits_rowid() {
        let message = TraceMessage::new(TracePayload::Accelerometer(AccelSample {
            time: 1,
            x: 0.0,
            y: 0.0,
            z: 9.8,
        }));
        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains("rowId"));
    }

    #[test]
    fn test_vital_kind() {
        assert!(TraceKind::Gps.is_vital());
        assert!(!TraceKind::Summary.is_vital());
        assert!(!TraceKind::Accelerometer.is_vital());
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(TraceKind::Gps.as_str(), "gps");
        assert_eq!(TraceKind::Summary.as_str(), "summary");
        assert_eq!(TraceKind::Accelerometer.as_str(), "accelerometer");
    }
}
