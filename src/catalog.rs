use crate::data::{RawRoomRow, RoomRecord};
use crate::error::AssignError;
use chrono::NaiveDateTime;
use log::{info, warn};
use serde_json::Value;

/// Alias tables for the room catalog schema, in priority order.
/// Matching is case-insensitive on trimmed column labels.
const IDENTITY_ALIASES: [&str; 4] = ["location", "id", "room_id", "name"];
const START_ALIASES: [&str; 3] = ["start time", "start_time", "starttime"];
const END_ALIASES: [&str; 3] = ["end time", "end_time", "endtime"];
const CAPACITY_ALIAS: &str = "capacity";

/// Result of normalizing one raw catalog.
///
/// Rows without a usable identity are collected in `rejected` rather than
/// failing the whole catalog.
#[derive(Debug, Clone)]
pub struct NormalizedCatalog {
    pub rooms: Vec<RoomRecord>,
    pub rejected: Vec<AssignError>,
}

/// Canonicalizes heterogeneous room rows into `RoomRecord`s.
///
/// Missing capacity defaults to 1, which silently caps assignability; a
/// warning is logged so operators can spot catalogs exported without the
/// column. Missing window bounds mean the room is available for the full
/// scheduling horizon. Duplicate identities are kept as independent
/// bookable units.
pub fn normalize_rooms(rows: &[RawRoomRow]) -> NormalizedCatalog {
    let mut rooms = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        match normalize_row(row) {
            Some(room) => rooms.push(room),
            None => {
                warn!("room row {idx} rejected: no identity column");
                rejected.push(AssignError::MissingIdentity { row: idx });
            }
        }
    }

    info!(
        "Normalized room catalog: {} rooms, {} rows rejected",
        rooms.len(),
        rejected.len()
    );
    NormalizedCatalog { rooms, rejected }
}

fn normalize_row(row: &RawRoomRow) -> Option<RoomRecord> {
    let id = resolve_identity(row)?;

    let capacity = match resolve_field(row, &[CAPACITY_ALIAS]) {
        Some(value) => match value_as_capacity(value) {
            Some(c) => c,
            None => {
                warn!("room '{id}': unparseable capacity {value:?}, defaulting to 1");
                1
            }
        },
        None => {
            warn!("room '{id}': no capacity column, defaulting to 1");
            1
        }
    };

    let start = resolve_field(row, &START_ALIASES).and_then(|v| value_as_datetime(&id, v));
    let end = resolve_field(row, &END_ALIASES).and_then(|v| value_as_datetime(&id, v));
    // Only a complete window restricts availability.
    let window = match (start, end) {
        (Some(s), Some(e)) => Some((s, e)),
        _ => None,
    };

    Some(RoomRecord {
        id,
        capacity,
        window,
    })
}

/// First identity alias with a non-blank value wins.
pub fn resolve_identity(row: &RawRoomRow) -> Option<String> {
    let value = resolve_field(row, &IDENTITY_ALIASES)?;
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() { None } else { Some(id) }
}

/// Looks the row up by each alias in priority order, comparing trimmed,
/// lowercased column labels. Null values count as absent.
fn resolve_field<'a>(row: &'a RawRoomRow, aliases: &[&str]) -> Option<&'a Value> {
    for alias in aliases {
        let hit = row
            .iter()
            .find(|(label, value)| label.trim().to_lowercase() == *alias && !value.is_null());
        if let Some((_, value)) = hit {
            return Some(value);
        }
    }
    None
}

fn value_as_capacity(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n >= 1.0 { Some(n as u32) } else { None }
}

/// Accepts `2025-12-01T09:00:00` and the space-separated variant; anything
/// else is treated as an absent bound.
fn value_as_datetime(room_id: &str, value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?.trim();
    let parsed = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"));
    match parsed {
        Ok(dt) => Some(dt),
        Err(_) => {
            warn!("room '{room_id}': unparseable time '{text}', treating bound as open");
            None
        }
    }
}
