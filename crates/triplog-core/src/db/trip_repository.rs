//! Trip repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::{Error, Result};
use crate::models::{
    GpsFix, TraceId, TraceKind, TraceMessage, TracePayload, Trip, TripGuid, TripId, TripPatch,
    TripStatus,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

/// Which trips a [`TripStore::load_trips`] query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripFilter {
    /// Default history view: everything except deleted trips
    History,
    /// Upload candidates: unsynced metadata on non-live trips
    Unsynced,
    /// No status filter
    All,
}

/// Trait for durable trip and trace storage.
///
/// All operations are transactional and parameterized. Ownership scoping is
/// an explicit argument; implementations never look up the current user
/// themselves.
pub trait TripStore {
    /// Insert a new Live trip. Fails with [`Error::DuplicateTrip`] when the
    /// guid already exists.
    fn create_trip(&self, guid: &TripGuid, start_time: i64, owner: Option<&str>) -> Result<TripId>;

    /// Append a single trace to an existing trip.
    fn append_trace(&self, guid: &TripGuid, payload: &TracePayload, synced: bool)
        -> Result<TraceId>;

    /// Append a batch of traces in one transaction, returning row ids in
    /// input order.
    fn append_traces(
        &self,
        guid: &TripGuid,
        payloads: &[TracePayload],
        synced: bool,
    ) -> Result<Vec<TraceId>>;

    /// Atomically create a trip row together with its traces, all marked
    /// synced (used for server-downloaded trips). If any insert fails the
    /// whole operation rolls back.
    fn create_trip_with_traces(
        &self,
        meta: &TripPatch,
        payloads: &[TracePayload],
        owner: Option<&str>,
    ) -> Result<TripId>;

    /// Bulk flip the per-row sync flag. No-op on empty input.
    fn mark_traces_synced(&self, trace_ids: &[TraceId]) -> Result<()>;

    /// Flip the trip *metadata* sync flag only.
    fn mark_trip_synced(&self, guid: &TripGuid) -> Result<()>;

    /// One-way transition out of Live. Already-terminal trips are left
    /// untouched; transitioning *to* Live is rejected.
    fn finalize_trip(&self, guid: &TripGuid, status: TripStatus) -> Result<()>;

    /// Recovery from abnormal termination: every trip stuck in Live becomes
    /// Finalized. Returns the number of trips transitioned.
    fn finalize_live_trips(&self) -> Result<usize>;

    /// Mark a trip Deleted and unsynced so the deletion reaches the server
    /// on the next cycle. The row is never physically removed.
    fn delete_trip(&self, guid: &TripGuid) -> Result<()>;

    /// Full metadata overwrite; resets the sync flag.
    fn update_trip(&self, trip: &Trip) -> Result<()>;

    /// Apply only the non-`None` fields of a server-sourced patch. Does not
    /// touch the sync flag; silently ignores guids with no local row.
    fn update_trip_sparse(&self, patch: &TripPatch) -> Result<()>;

    /// Apply a list of patches inside one transaction.
    fn update_trips_sparse(&self, patches: &[TripPatch]) -> Result<()>;

    /// Load one trip by guid.
    fn get_trip(&self, guid: &TripGuid) -> Result<Option<Trip>>;

    /// Load trips for the given owner (plus anonymous rows), newest first.
    fn load_trips(&self, owner: Option<&str>, filter: TripFilter) -> Result<Vec<Trip>>;

    /// Non-live trips that still have unsynced traces of the allowed type
    /// set, newest first.
    fn trips_with_unsent_traces(&self, owner: Option<&str>, vital_only: bool) -> Result<Vec<Trip>>;

    /// Bounded batch of unsynced traces for one trip, in insertion order.
    fn unsent_traces(
        &self,
        guid: &TripGuid,
        limit: usize,
        vital_only: bool,
    ) -> Result<Vec<TraceMessage>>;

    /// Every GPS fix of a trip in insertion order.
    fn gps_points(&self, guid: &TripGuid) -> Result<Vec<GpsFix>>;

    /// Move all anonymous trips to the given owner in one atomic update.
    /// Returns the number of reassigned trips.
    fn reassign_ownership(&self, new_owner: &str) -> Result<usize>;
}

/// `SQLite` implementation of `TripStore`
pub struct SqliteTripStore<'a> {
    conn: &'a Connection,
}

const TRIP_COLUMNS: &str =
    "trip.id, trip.uuid, trip.starttime, trip.endtime, trip.distance, trip.score, trip.tilt, \
     trip.status, trip.synced, trip.email";

impl<'a> SqliteTripStore<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Resolve a guid to the device-local row id.
    fn trip_local_id(&self, guid: &TripGuid) -> Result<TripId> {
        let result = self.conn.query_row(
            "SELECT id FROM trip WHERE uuid = ?",
            params![guid.as_str()],
            |row| row.get(0),
        );
        match result {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::UnknownTrip(*guid)),
            Err(error) => Err(error.into()),
        }
    }

    /// Parse a trip from a database row
    fn parse_trip(row: &rusqlite::Row<'_>) -> rusqlite::Result<Trip> {
        let guid: String = row.get(1)?;
        let guid = guid.parse().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(error))
        })?;
        let status: i64 = row.get(7)?;
        let status = TripStatus::from_i64(status)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(7, status))?;

        Ok(Trip {
            id: row.get(0)?,
            guid,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            distance: row.get(4)?,
            score: row.get(5)?,
            tilt: row.get(6)?,
            status,
            synced: row.get::<_, i32>(8)? != 0,
            owner: row.get(9)?,
        })
    }

    /// Parse a trace row (id, value) back into a message with its rowid set.
    fn parse_trace(row: &rusqlite::Row<'_>) -> rusqlite::Result<TraceMessage> {
        let id: TraceId = row.get(0)?;
        let value: String = row.get(1)?;
        let payload: TracePayload = serde_json::from_str(&value).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(error))
        })?;
        Ok(TraceMessage {
            payload,
            rowid: Some(id),
        })
    }

    fn query_trips(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Trip>> {
        let mut stmt = self.conn.prepare(sql)?;
        let trips = stmt
            .query_map(params_from_iter(values), Self::parse_trip)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(trips)
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Insert trace rows for an already-resolved trip id on the given connection
/// (plain or transactional).
fn insert_traces(
    conn: &Connection,
    trip_id: TripId,
    payloads: &[TracePayload],
    synced: bool,
) -> Result<Vec<TraceId>> {
    let mut stmt =
        conn.prepare("INSERT INTO trace (tripid, type, value, synced) VALUES (?, ?, ?, ?)")?;
    let mut ids = Vec::with_capacity(payloads.len());
    for payload in payloads {
        stmt.execute(params![
            trip_id,
            payload.kind().as_str(),
            serde_json::to_string(payload)?,
            i32::from(synced)
        ])?;
        ids.push(conn.last_insert_rowid());
    }
    Ok(ids)
}

/// Apply the non-`None` fields of a patch on the given connection.
fn apply_patch(conn: &Connection, patch: &TripPatch) -> Result<()> {
    let mut assignments = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(distance) = patch.distance {
        assignments.push("distance = ?");
        values.push(Value::Real(distance));
    }
    if let Some(status) = patch.status {
        assignments.push("status = ?");
        values.push(Value::Integer(status.as_i64()));
    }
    if assignments.is_empty() {
        return Ok(());
    }

    values.push(Value::Text(patch.guid.as_str()));
    let sql = format!("UPDATE trip SET {} WHERE uuid = ?", assignments.join(", "));
    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

impl TripStore for SqliteTripStore<'_> {
    fn create_trip(&self, guid: &TripGuid, start_time: i64, owner: Option<&str>) -> Result<TripId> {
        let result = self.conn.execute(
            "INSERT INTO trip (uuid, starttime, endtime, distance, score, tilt, status, synced, email)
             VALUES (?, ?, ?, 0, 10, 0, ?, 0, ?)",
            params![
                guid.as_str(),
                start_time,
                start_time,
                TripStatus::Live.as_i64(),
                owner.unwrap_or("")
            ],
        );
        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(error) if is_unique_violation(&error) => Err(Error::DuplicateTrip(*guid)),
            Err(error) => Err(error.into()),
        }
    }

    fn append_trace(
        &self,
        guid: &TripGuid,
        payload: &TracePayload,
        synced: bool,
    ) -> Result<TraceId> {
        let trip_id = self.trip_local_id(guid)?;
        self.conn.execute(
            "INSERT INTO trace (tripid, type, value, synced) VALUES (?, ?, ?, ?)",
            params![
                trip_id,
                payload.kind().as_str(),
                serde_json::to_string(payload)?,
                i32::from(synced)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn append_traces(
        &self,
        guid: &TripGuid,
        payloads: &[TracePayload],
        synced: bool,
    ) -> Result<Vec<TraceId>> {
        let trip_id = self.trip_local_id(guid)?;
        let tx = self.conn.unchecked_transaction()?;
        let ids = insert_traces(&tx, trip_id, payloads, synced)?;
        tx.commit()?;
        Ok(ids)
    }

    fn create_trip_with_traces(
        &self,
        meta: &TripPatch,
        payloads: &[TracePayload],
        owner: Option<&str>,
    ) -> Result<TripId> {
        let tx = self.conn.unchecked_transaction()?;

        // time range defaults to the trace span when traces are present
        let start_time = payloads.first().map_or(0, TracePayload::time);
        let end_time = payloads.last().map_or(start_time, TracePayload::time);

        let inserted = tx.execute(
            "INSERT INTO trip (uuid, starttime, endtime, distance, score, tilt, status, synced, email)
             VALUES (?, ?, ?, ?, 10, 0, ?, 1, ?)",
            params![
                meta.guid.as_str(),
                start_time,
                end_time,
                meta.distance.unwrap_or(0.0),
                meta.status.unwrap_or(TripStatus::Finalized).as_i64(),
                owner.unwrap_or("")
            ],
        );
        if let Err(error) = inserted {
            return Err(if is_unique_violation(&error) {
                Error::DuplicateTrip(meta.guid)
            } else {
                error.into()
            });
        }

        let trip_id = tx.last_insert_rowid();
        insert_traces(&tx, trip_id, payloads, true)?;
        tx.commit()?;
        Ok(trip_id)
    }

    fn mark_traces_synced(&self, trace_ids: &[TraceId]) -> Result<()> {
        if trace_ids.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; trace_ids.len()].join(", ");
        let sql = format!("UPDATE trace SET synced = 1 WHERE id IN ({placeholders})");
        self.conn
            .execute(&sql, params_from_iter(trace_ids.iter()))?;
        Ok(())
    }

    fn mark_trip_synced(&self, guid: &TripGuid) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE trip SET synced = 1 WHERE uuid = ?",
            params![guid.as_str()],
        )?;
        if rows == 0 {
            return Err(Error::UnknownTrip(*guid));
        }
        Ok(())
    }

    fn finalize_trip(&self, guid: &TripGuid, status: TripStatus) -> Result<()> {
        if status == TripStatus::Live {
            return Err(Error::InvalidInput(
                "a trip cannot transition back to Live".into(),
            ));
        }

        let rows = self.conn.execute(
            "UPDATE trip SET status = ? WHERE uuid = ? AND status = ?",
            params![
                status.as_i64(),
                guid.as_str(),
                TripStatus::Live.as_i64()
            ],
        )?;
        if rows == 0 && self.get_trip(guid)?.is_none() {
            return Err(Error::UnknownTrip(*guid));
        }
        Ok(())
    }

    fn finalize_live_trips(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE trip SET status = ? WHERE status = ?",
            params![
                TripStatus::Finalized.as_i64(),
                TripStatus::Live.as_i64()
            ],
        )?;
        if rows > 0 {
            tracing::info!(count = rows, "finalized trips left over from a previous run");
        }
        Ok(rows)
    }

    fn delete_trip(&self, guid: &TripGuid) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE trip SET status = ?, synced = 0 WHERE uuid = ?",
            params![TripStatus::Deleted.as_i64(), guid.as_str()],
        )?;
        if rows == 0 {
            return Err(Error::UnknownTrip(*guid));
        }
        Ok(())
    }

    fn update_trip(&self, trip: &Trip) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE trip SET starttime = ?, endtime = ?, distance = ?, score = ?, tilt = ?,
                    status = ?, synced = 0
             WHERE uuid = ?",
            params![
                trip.start_time,
                trip.end_time,
                trip.distance,
                trip.score,
                trip.tilt,
                trip.status.as_i64(),
                trip.guid.as_str()
            ],
        )?;
        if rows == 0 {
            return Err(Error::UnknownTrip(trip.guid));
        }
        Ok(())
    }

    fn update_trip_sparse(&self, patch: &TripPatch) -> Result<()> {
        apply_patch(self.conn, patch)
    }

    fn update_trips_sparse(&self, patches: &[TripPatch]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for patch in patches {
            apply_patch(&tx, patch)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_trip(&self, guid: &TripGuid) -> Result<Option<Trip>> {
        let sql = format!("SELECT {TRIP_COLUMNS} FROM trip WHERE uuid = ?");
        let result = self
            .conn
            .query_row(&sql, params![guid.as_str()], Self::parse_trip);
        match result {
            Ok(trip) => Ok(Some(trip)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn load_trips(&self, owner: Option<&str>, filter: TripFilter) -> Result<Vec<Trip>> {
        let mut sql = format!("SELECT {TRIP_COLUMNS} FROM trip WHERE ");
        let mut values: Vec<Value> = Vec::new();

        match owner {
            Some(email) => {
                sql.push_str("(email = ? OR email = '')");
                values.push(Value::Text(email.to_string()));
            }
            None => sql.push_str("email = ''"),
        }
        match filter {
            TripFilter::History => {
                sql.push_str(" AND status <> ?");
                values.push(Value::Integer(TripStatus::Deleted.as_i64()));
            }
            TripFilter::Unsynced => {
                sql.push_str(" AND synced = 0 AND status <> ?");
                values.push(Value::Integer(TripStatus::Live.as_i64()));
            }
            TripFilter::All => {}
        }
        sql.push_str(" ORDER BY starttime DESC");

        self.query_trips(&sql, values)
    }

    fn trips_with_unsent_traces(&self, owner: Option<&str>, vital_only: bool) -> Result<Vec<Trip>> {
        let mut sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trip
             INNER JOIN (SELECT DISTINCT tripid FROM trace WHERE synced = 0"
        );
        let mut values: Vec<Value> = Vec::new();

        if vital_only {
            sql.push_str(" AND type = ?");
            values.push(Value::Text(TraceKind::VITAL.as_str().to_string()));
        }
        sql.push_str(") AS unsent ON trip.id = unsent.tripid WHERE ");
        match owner {
            Some(email) => {
                sql.push_str("(trip.email = ? OR trip.email = '')");
                values.push(Value::Text(email.to_string()));
            }
            None => sql.push_str("trip.email = ''"),
        }
        sql.push_str(" AND trip.status <> ? ORDER BY trip.starttime DESC");
        values.push(Value::Integer(TripStatus::Live.as_i64()));

        self.query_trips(&sql, values)
    }

    fn unsent_traces(
        &self,
        guid: &TripGuid,
        limit: usize,
        vital_only: bool,
    ) -> Result<Vec<TraceMessage>> {
        let mut sql = String::from(
            "SELECT trace.id, trace.value FROM trip
             INNER JOIN trace ON trace.tripid = trip.id
             WHERE trace.synced = 0 AND trip.uuid = ?",
        );
        let mut values: Vec<Value> = vec![Value::Text(guid.as_str())];

        if vital_only {
            sql.push_str(" AND trace.type = ?");
            values.push(Value::Text(TraceKind::VITAL.as_str().to_string()));
        }
        sql.push_str(" ORDER BY trace.id ASC LIMIT ?");
        values.push(Value::Integer(limit as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let traces = stmt
            .query_map(params_from_iter(values), Self::parse_trace)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(traces)
    }

    fn gps_points(&self, guid: &TripGuid) -> Result<Vec<GpsFix>> {
        let mut stmt = self.conn.prepare(
            "SELECT trace.id, trace.value FROM trip
             INNER JOIN trace ON trace.tripid = trip.id
             WHERE trace.type = ? AND trip.uuid = ?
             ORDER BY trace.id ASC",
        )?;
        let messages = stmt
            .query_map(
                params![TraceKind::Gps.as_str(), guid.as_str()],
                Self::parse_trace,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(messages
            .into_iter()
            .filter_map(|message| match message.payload {
                TracePayload::Gps(fix) => Some(fix),
                _ => None,
            })
            .collect())
    }

    fn reassign_ownership(&self, new_owner: &str) -> Result<usize> {
        if new_owner.is_empty() {
            return Err(Error::InvalidInput("owner email must not be empty".into()));
        }
        let rows = self.conn.execute(
            "UPDATE trip SET email = ? WHERE email = ''",
            params![new_owner],
        )?;
        Ok(rows)
    }
}
