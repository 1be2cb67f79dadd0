use crate::data::{AssignmentOutcome, ExamGroup, RoomRecord, SolveStatus, Strategy};
use chrono::NaiveDateTime;
use itertools::Itertools;
use log::{debug, info};
use std::collections::HashMap;
use std::time::Instant;

/// Run-scoped record of which room units are already committed to which
/// time intervals. Keyed by catalog index so duplicate room ids stay
/// independent bookable units. Owned by exactly one greedy run.
#[derive(Debug, Default)]
pub struct ReservationLedger {
    committed: HashMap<usize, Vec<(NaiveDateTime, NaiveDateTime)>>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[start, end)` clashes with an interval already committed
    /// against this room unit.
    pub fn is_free(&self, room_idx: usize, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        match self.committed.get(&room_idx) {
            Some(intervals) => intervals.iter().all(|&(s, e)| start.max(s) >= end.min(e)),
            None => true,
        }
    }

    pub fn commit(&mut self, room_idx: usize, start: NaiveDateTime, end: NaiveDateTime) {
        self.committed.entry(room_idx).or_default().push((start, end));
    }
}

/// Deterministic smallest-fit-first assignment requiring no solver.
///
/// Groups are processed in ascending start order (ties: shorter duration
/// first, then first-seen order). Candidate rooms are scanned in ascending
/// capacity order to conserve large rooms: the smallest single room that
/// fits wins, and only a group too large for any one room accumulates
/// several units until their combined capacity covers it. Honors the same hard
/// constraints as the ILP path (capacity, availability, no double-booking)
/// but does not guarantee room-count optimality. Runs in time proportional
/// to groups × rooms.
pub fn assign_greedy(groups: &[ExamGroup], rooms: &[RoomRecord]) -> AssignmentOutcome {
    let started = Instant::now();
    let mut ledger = ReservationLedger::new();
    let mut assignments = vec![Vec::new(); groups.len()];
    let mut had_candidates = vec![false; groups.len()];

    let order: Vec<usize> = (0..groups.len())
        .sorted_by_key(|&i| (groups[i].start, groups[i].duration(), i))
        .collect();

    for &gi in &order {
        let group = &groups[gi];
        let candidates: Vec<usize> = (0..rooms.len())
            .filter(|&r| {
                rooms[r].covers(group.start, group.end)
                    && ledger.is_free(r, group.start, group.end)
            })
            .sorted_by(|&a, &b| {
                rooms[a]
                    .capacity
                    .cmp(&rooms[b].capacity)
                    .then_with(|| rooms[a].id.cmp(&rooms[b].id))
                    .then(a.cmp(&b))
            })
            .collect();
        had_candidates[gi] = !candidates.is_empty();

        let demand = group.student_count as u64;
        // Smallest single room that fits; only when none does, accumulate
        // rooms smallest-first until their combined capacity covers demand.
        let mut chosen = Vec::new();
        let mut covered: u64 = 0;
        if let Some(&fit) = candidates
            .iter()
            .find(|&&r| rooms[r].capacity as u64 >= demand)
        {
            chosen.push(fit);
            covered = rooms[fit].capacity as u64;
        } else {
            for &r in &candidates {
                if covered >= demand {
                    break;
                }
                chosen.push(r);
                covered += rooms[r].capacity as u64;
            }
        }

        if covered >= demand && !chosen.is_empty() {
            for &r in &chosen {
                ledger.commit(r, group.start, group.end);
            }
            debug!(
                "Group {gi} ({} students) -> {:?}",
                group.student_count,
                chosen.iter().map(|&r| rooms[r].id.as_str()).collect::<Vec<_>>()
            );
            assignments[gi] = chosen;
        } else {
            debug!(
                "Group {gi} ({} students) unassigned: {} candidates covering {covered}",
                group.student_count,
                candidates.len()
            );
        }
    }

    let assigned = assignments.iter().filter(|a| !a.is_empty()).count();
    info!(
        "Greedy assignment: {assigned}/{} groups covered in {:.2?}",
        groups.len(),
        started.elapsed()
    );

    AssignmentOutcome {
        assignments,
        had_candidates,
        status: SolveStatus::HeuristicOk,
        objective_value: None,
        solve_time: started.elapsed(),
        strategy: Strategy::Greedy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn group(start: u32, end: u32, students: u32) -> ExamGroup {
        ExamGroup {
            start: dt(start),
            end: dt(end),
            student_count: students,
            student_ids: (0..students).map(|i| format!("s{i}")).collect(),
            crns: vec!["c1".into()],
            members: Vec::new(),
        }
    }

    fn room(id: &str, capacity: u32, window: Option<(u32, u32)>) -> RoomRecord {
        RoomRecord {
            id: id.to_string(),
            capacity,
            window: window.map(|(s, e)| (dt(s), dt(e))),
        }
    }

    #[test]
    fn ledger_tracks_half_open_intervals() {
        let mut ledger = ReservationLedger::new();
        ledger.commit(0, dt(10), dt(12));
        assert!(!ledger.is_free(0, dt(11), dt(13)));
        // back-to-back is free
        assert!(ledger.is_free(0, dt(12), dt(14)));
        // other room unit untouched
        assert!(ledger.is_free(1, dt(11), dt(13)));
    }

    #[test]
    fn overlapping_groups_get_disjoint_rooms() {
        // Scenario A from the original formulation notes.
        let groups = vec![group(10, 12, 18), group(11, 13, 10)];
        let rooms = vec![room("R1", 20, Some((8, 22))), room("R2", 12, Some((8, 22)))];
        let outcome = assign_greedy(&groups, &rooms);
        assert_eq!(outcome.status, SolveStatus::HeuristicOk);
        assert_eq!(outcome.room_ids(0, &rooms), vec!["R1"]);
        assert_eq!(outcome.room_ids(1, &rooms), vec!["R2"]);
    }

    #[test]
    fn smallest_fit_first_conserves_large_rooms() {
        let groups = vec![group(10, 12, 8)];
        let rooms = vec![room("Big", 100, None), room("Small", 10, None)];
        let outcome = assign_greedy(&groups, &rooms);
        assert_eq!(outcome.room_ids(0, &rooms), vec!["Small"]);
    }

    #[test]
    fn group_can_span_multiple_rooms() {
        let groups = vec![group(10, 12, 25)];
        let rooms = vec![room("R1", 10, None), room("R2", 10, None), room("R3", 10, None)];
        let outcome = assign_greedy(&groups, &rooms);
        assert_eq!(outcome.room_ids(0, &rooms), vec!["R1", "R2", "R3"]);
    }

    #[test]
    fn insufficient_capacity_leaves_group_unassigned() {
        // Scenario B: 25 students, one 20-seat room.
        let groups = vec![group(10, 12, 25)];
        let rooms = vec![room("R1", 20, None)];
        let outcome = assign_greedy(&groups, &rooms);
        assert!(outcome.assignments[0].is_empty());
        assert!(outcome.had_candidates[0]);
    }

    #[test]
    fn no_candidates_is_distinguished_from_no_capacity() {
        let groups = vec![group(10, 12, 5)];
        let rooms = vec![room("R1", 30, Some((14, 22)))];
        let outcome = assign_greedy(&groups, &rooms);
        assert!(outcome.assignments[0].is_empty());
        assert!(!outcome.had_candidates[0]);
    }

    #[test]
    fn non_overlapping_groups_may_reuse_a_room() {
        let groups = vec![group(10, 12, 10), group(12, 14, 10)];
        let rooms = vec![room("R1", 12, None)];
        let outcome = assign_greedy(&groups, &rooms);
        assert_eq!(outcome.room_ids(0, &rooms), vec!["R1"]);
        assert_eq!(outcome.room_ids(1, &rooms), vec!["R1"]);
    }

    #[test]
    fn earlier_start_processed_first_ties_broken_by_duration() {
        // Both start at 10; the shorter one grabs the only free room first.
        let groups = vec![group(10, 14, 10), group(10, 12, 10)];
        let rooms = vec![room("R1", 12, None)];
        let outcome = assign_greedy(&groups, &rooms);
        assert!(outcome.assignments[0].is_empty());
        assert_eq!(outcome.room_ids(1, &rooms), vec!["R1"]);
    }

    #[test]
    fn runs_do_not_share_ledger_state() {
        let groups = vec![group(10, 12, 10)];
        let rooms = vec![room("R1", 12, None)];
        let first = assign_greedy(&groups, &rooms);
        let second = assign_greedy(&groups, &rooms);
        assert_eq!(first.assignments, second.assignments);
    }
}
