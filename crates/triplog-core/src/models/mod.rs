//! Data models for Triplog

mod trace;
mod trip;

pub use trace::{
    AccelSample, GpsFix, SummarySnapshot, TraceId, TraceKind, TraceMessage, TracePayload,
};
pub use trip::{Trip, TripGuid, TripId, TripPatch, TripStatus};
