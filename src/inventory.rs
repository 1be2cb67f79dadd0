use crate::catalog::normalize_rooms;
use crate::data::{RawRoomRow, RoomRecord};
use crate::error::AssignError;
use crate::greedy::ReservationLedger;
use chrono::NaiveDateTime;
use log::{debug, warn};

/// Interface to a room inventory source.
///
/// Implementations return rows in the aliasable catalog schema; the alias
/// rules of the normalizer apply to whatever an adapter produces. The
/// network-service adapter lives behind this same trait.
pub trait RoomInventory {
    /// Rooms whose availability window contains `[start, end)` and whose
    /// capacity is at least `min_capacity`.
    fn search_rooms(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        min_capacity: u32,
    ) -> Result<Vec<RawRoomRow>, AssignError>;

    fn list_rooms(&self) -> Result<Vec<RawRoomRow>, AssignError>;

    /// Commits `[start, end)` against a room. Returns false when the room
    /// is unknown, outside its window, or already booked for the interval.
    fn reserve_room(
        &mut self,
        room_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        note: &str,
    ) -> Result<bool, AssignError>;
}

/// Inventory backed by a pre-loaded raw catalog, the tabular form of the
/// room source. Rows that fail normalization are skipped with a warning and
/// never returned from searches.
pub struct CatalogInventory {
    rows: Vec<RawRoomRow>,
    rooms: Vec<Option<RoomRecord>>,
    reservations: ReservationLedger,
}

impl CatalogInventory {
    pub fn new(rows: Vec<RawRoomRow>) -> Self {
        let mut rooms = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let normalized = normalize_rooms(std::slice::from_ref(row));
            match normalized.rooms.into_iter().next() {
                Some(room) => rooms.push(Some(room)),
                None => {
                    warn!("catalog row {idx} unusable for inventory searches");
                    rooms.push(None);
                }
            }
        }
        CatalogInventory {
            rows,
            rooms,
            reservations: ReservationLedger::new(),
        }
    }
}

impl RoomInventory for CatalogInventory {
    fn search_rooms(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        min_capacity: u32,
    ) -> Result<Vec<RawRoomRow>, AssignError> {
        let hits: Vec<RawRoomRow> = self
            .rooms
            .iter()
            .zip(&self.rows)
            .filter_map(|(room, row)| {
                let room = room.as_ref()?;
                (room.capacity >= min_capacity && room.covers(start, end)).then(|| row.clone())
            })
            .collect();
        debug!(
            "Inventory search [{start} .. {end}) cap>={min_capacity}: {} rooms",
            hits.len()
        );
        Ok(hits)
    }

    fn list_rooms(&self) -> Result<Vec<RawRoomRow>, AssignError> {
        Ok(self.rows.clone())
    }

    fn reserve_room(
        &mut self,
        room_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        note: &str,
    ) -> Result<bool, AssignError> {
        for (idx, room) in self.rooms.iter().enumerate() {
            let Some(room) = room else { continue };
            if room.id == room_id
                && room.covers(start, end)
                && self.reservations.is_free(idx, start, end)
            {
                self.reservations.commit(idx, start, end);
                debug!("Reserved '{room_id}' [{start} .. {end}): {note}");
                return Ok(true);
            }
        }
        Ok(false)
    }
}
