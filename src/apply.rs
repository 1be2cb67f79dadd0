use crate::data::{AssignmentOutcome, ExamRecord, RoomRecord, Strategy, status};
use crate::grouping::{Disposition, Grouping};
use log::{info, warn};
use std::collections::HashMap;

/// Maps a solve outcome back onto individual exam records.
///
/// Pure fan-out: every record gets the decision already made for its group,
/// plus a status string; no further decision-making happens here. Members of
/// a multi-room group are distributed across the group's room units in
/// order, filling each up to its own capacity (units are catalog indices,
/// so duplicate ids with different capacities fill independently). The
/// function clones its input, so applying
/// the same outcome twice yields identical output.
pub fn apply_assignments(
    records: &[ExamRecord],
    grouping: &Grouping,
    outcome: &AssignmentOutcome,
    rooms: &[RoomRecord],
) -> Vec<ExamRecord> {
    let assigned_status = match outcome.strategy {
        Strategy::Ilp => status::ASSIGNED_ILP,
        Strategy::Greedy => status::ASSIGNED_GREEDY,
    };

    // (group, slot within its room list) -> students placed so far
    let mut fill: HashMap<(usize, usize), u32> = HashMap::new();

    let mut annotated = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let mut out = record.clone();
        out.assigned_room_id.clear();
        out.assigned_room_name.clear();
        out.assigned_room_location.clear();

        match grouping.dispositions.get(idx) {
            Some(Disposition::NotScheduled) | None => {
                out.room_assignment_status = status::NOT_SCHEDULED.to_string();
            }
            Some(Disposition::InvalidTimes) => {
                out.room_assignment_status = status::INVALID_TIME_SLOT.to_string();
            }
            Some(&Disposition::Grouped(gi)) => {
                let group_rooms = &outcome.assignments[gi];
                if group_rooms.is_empty() {
                    out.room_assignment_status = if outcome.had_candidates[gi] {
                        status::NO_CAPACITY.to_string()
                    } else {
                        status::NO_ROOMS_AVAILABLE.to_string()
                    };
                } else {
                    let mut placed = false;
                    for (slot, &unit) in group_rooms.iter().enumerate() {
                        let room = &rooms[unit];
                        let used = fill.entry((gi, slot)).or_insert(0);
                        if *used < room.capacity {
                            *used += 1;
                            out.assigned_room_id = room.id.clone();
                            out.assigned_room_name = room.id.clone();
                            out.assigned_room_location = room.id.clone();
                            out.room_assignment_status = assigned_status.to_string();
                            placed = true;
                            break;
                        }
                    }
                    if !placed {
                        // Cannot happen while the coverage invariant holds.
                        warn!(
                            "record {idx}: all rooms of group {gi} at capacity despite assignment"
                        );
                        out.room_assignment_status = status::ROOMS_FULL.to_string();
                    }
                }
            }
        }
        annotated.push(out);
    }

    let assigned = annotated
        .iter()
        .filter(|r| r.room_assignment_status.starts_with("Assigned"))
        .count();
    info!(
        "Applied assignments: {assigned}/{} records assigned",
        annotated.len()
    );
    annotated
}
