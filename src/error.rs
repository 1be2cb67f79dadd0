use thiserror::Error;

/// Errors surfaced by the room-assignment engine.
///
/// Per-row problems (`MissingIdentity`) are recovered locally: the row is
/// dropped, reported, and processing continues. Configuration problems are
/// fatal because no partial progress is meaningful without them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssignError {
    #[error("room row {row} has no identity column (location/id/room_id/name)")]
    MissingIdentity { row: usize },

    #[error("unknown objective '{0}' (expected 'minimize_rooms' or 'minimize_weighted')")]
    UnknownObjective(String),

    #[error("unknown strategy '{0}' (expected 'ilp' or 'greedy')")]
    UnknownStrategy(String),

    #[error("no room source configured: provide a room catalog or an inventory adapter")]
    NoRoomSource,

    #[error("room inventory error: {0}")]
    Inventory(String),
}
