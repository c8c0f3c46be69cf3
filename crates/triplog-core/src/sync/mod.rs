//! Upload scheduling and the wire session.

mod scheduler;
mod upload;

pub use scheduler::{Connectivity, SyncOutcome, SyncScheduler};
pub use upload::{HttpUploadTransport, TripPayload, UploadOutcome, UploadSession, UploadTransport};
