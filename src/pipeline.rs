use crate::apply::apply_assignments;
use crate::builder::solve_assignment;
use crate::catalog::{normalize_rooms, resolve_identity};
use crate::data::{
    AssignmentOutcome, ExamGroup, ExamRecord, RawRoomRow, RoomRecord, RunConfig, Strategy,
};
use crate::error::AssignError;
use crate::greedy::assign_greedy;
use crate::grouping::{Grouping, group_exams, overlap_pairs};
use crate::inventory::RoomInventory;
use crate::model::{HighsSolver, MilpSolver};
use itertools::Itertools;
use log::{info, warn};

/// Where room rows come from: a pre-loaded catalog or an inventory adapter.
enum RoomSource {
    Catalog(Vec<RawRoomRow>),
    Inventory(Box<dyn RoomInventory>),
}

/// Everything one run produced, for callers that want more than the
/// annotated records.
pub struct RunReport {
    pub records: Vec<ExamRecord>,
    pub outcome: AssignmentOutcome,
    pub groups: Vec<ExamGroup>,
    /// The normalized catalog the outcome's unit indices point into.
    pub rooms: Vec<RoomRecord>,
    pub rejected_rooms: Vec<AssignError>,
}

impl RunReport {
    pub fn assigned_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.room_assignment_status.starts_with("Assigned"))
            .count()
    }

    pub fn unassigned_count(&self) -> usize {
        self.records.len() - self.assigned_count()
    }
}

/// The room-assignment pipeline: group → rooms → overlaps → strategy →
/// apply. One instance per configuration; each `run` call is an independent
/// pass with its own reservation state.
pub struct Pipeline {
    source: RoomSource,
    config: RunConfig,
    solver: Box<dyn MilpSolver>,
}

impl Pipeline {
    /// Configures a pipeline. Exactly one room source must be provided;
    /// the catalog wins when both are. Both absent is a fatal
    /// configuration error since no partial progress is meaningful.
    pub fn new(
        catalog: Option<Vec<RawRoomRow>>,
        inventory: Option<Box<dyn RoomInventory>>,
        config: RunConfig,
    ) -> Result<Self, AssignError> {
        let source = match (catalog, inventory) {
            (Some(rows), _) => RoomSource::Catalog(rows),
            (None, Some(adapter)) => RoomSource::Inventory(adapter),
            (None, None) => return Err(AssignError::NoRoomSource),
        };
        Ok(Pipeline {
            source,
            config,
            solver: Box::new(HighsSolver),
        })
    }

    /// Swaps the MILP backend; the model-building logic is unchanged.
    pub fn with_solver(mut self, solver: Box<dyn MilpSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Runs the full assignment pass over a batch of exam records.
    pub fn run(&self, records: &[ExamRecord]) -> Result<RunReport, AssignError> {
        let grouping = group_exams(records);

        let raw_rows = self.collect_rows(&grouping)?;
        let catalog = normalize_rooms(&raw_rows);
        let overlaps = overlap_pairs(&grouping.groups);

        let outcome = self.assign(&grouping, &catalog.rooms, &overlaps);
        let annotated = apply_assignments(records, &grouping, &outcome, &catalog.rooms);

        let report = RunReport {
            records: annotated,
            outcome,
            groups: grouping.groups,
            rooms: catalog.rooms,
            rejected_rooms: catalog.rejected,
        };
        info!(
            "Run complete ({}): {} assigned, {} unassigned",
            report.outcome.status,
            report.assigned_count(),
            report.unassigned_count()
        );
        Ok(report)
    }

    fn assign(
        &self,
        grouping: &Grouping,
        rooms: &[RoomRecord],
        overlaps: &[(usize, usize)],
    ) -> AssignmentOutcome {
        match self.config.strategy {
            Strategy::Greedy => assign_greedy(&grouping.groups, rooms),
            Strategy::Ilp => {
                let outcome = solve_assignment(
                    &grouping.groups,
                    rooms,
                    overlaps,
                    self.config.objective,
                    self.solver.as_ref(),
                    self.config.time_limit,
                );
                if !outcome.status.is_usable() && self.config.fallback_to_greedy {
                    warn!(
                        "ILP path failed ({}); falling back to greedy assignment",
                        outcome.status
                    );
                    assign_greedy(&grouping.groups, rooms)
                } else {
                    outcome
                }
            }
        }
    }

    /// Gathers raw room rows for this batch. The inventory path searches
    /// per group window and demand, then unions the results de-duplicated
    /// by first-seen identity; rows without an identity are dropped here
    /// and reported by the normalizer on the catalog path.
    fn collect_rows(&self, grouping: &Grouping) -> Result<Vec<RawRoomRow>, AssignError> {
        match &self.source {
            RoomSource::Catalog(rows) => Ok(rows.clone()),
            RoomSource::Inventory(adapter) => {
                let mut all = Vec::new();
                for group in &grouping.groups {
                    let hits =
                        adapter.search_rooms(group.start, group.end, group.student_count)?;
                    all.extend(hits);
                }
                let rows: Vec<RawRoomRow> = all
                    .into_iter()
                    .filter_map(|row| resolve_identity(&row).map(|id| (id, row)))
                    .unique_by(|(id, _)| id.clone())
                    .map(|(_, row)| row)
                    .collect();
                info!("Inventory search produced {} distinct rooms", rows.len());
                Ok(rows)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Objective, SolveStatus, status};
    use crate::inventory::CatalogInventory;
    use crate::model::{MilpModel, SolveOutcome};
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::{Map, Value, json};
    use std::time::Duration;

    fn dt(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn record(student: &str, crn: &str, start: u32, end: u32) -> ExamRecord {
        ExamRecord {
            student_id: student.to_string(),
            crn: crn.to_string(),
            schedule_status: "SCHEDULED".to_string(),
            scheduled_start: Some(dt(start)),
            scheduled_end: Some(dt(end)),
            assigned_room_id: String::new(),
            assigned_room_name: String::new(),
            assigned_room_location: String::new(),
            room_assignment_status: String::new(),
            extra: Map::new(),
        }
    }

    fn room_row(id: &str, capacity: u32) -> RawRoomRow {
        let mut m = Map::new();
        m.insert("location".to_string(), json!(id));
        m.insert("capacity".to_string(), Value::from(capacity));
        m
    }

    struct Failing;
    impl MilpSolver for Failing {
        fn solve(&self, _: &MilpModel, _: Duration) -> SolveOutcome {
            SolveOutcome {
                status: SolveStatus::SolverError,
                objective_value: None,
                values: Vec::new(),
                elapsed: Duration::ZERO,
            }
        }
    }

    #[test]
    fn both_sources_absent_is_a_config_error() {
        let err = Pipeline::new(None, None, RunConfig::default()).err();
        assert_eq!(err, Some(AssignError::NoRoomSource));
    }

    #[test]
    fn greedy_run_assigns_from_catalog() {
        let config = RunConfig {
            strategy: Strategy::Greedy,
            ..RunConfig::default()
        };
        let pipeline =
            Pipeline::new(Some(vec![room_row("R1", 5)]), None, config).unwrap();
        let report = pipeline.run(&[record("s1", "c1", 10, 12)]).unwrap();
        assert_eq!(report.outcome.status, SolveStatus::HeuristicOk);
        assert_eq!(report.records[0].assigned_room_id, "R1");
        assert_eq!(report.assigned_count(), 1);
    }

    #[test]
    fn ilp_failure_falls_back_to_greedy_when_configured() {
        let config = RunConfig {
            strategy: Strategy::Ilp,
            objective: Objective::MinimizeRooms,
            time_limit: Duration::from_secs(1),
            fallback_to_greedy: true,
        };
        let pipeline = Pipeline::new(Some(vec![room_row("R1", 5)]), None, config)
            .unwrap()
            .with_solver(Box::new(Failing));
        let report = pipeline.run(&[record("s1", "c1", 10, 12)]).unwrap();
        assert_eq!(report.outcome.status, SolveStatus::HeuristicOk);
        assert_eq!(report.records[0].room_assignment_status, status::ASSIGNED_GREEDY);
    }

    #[test]
    fn ilp_failure_surfaces_without_fallback() {
        let config = RunConfig {
            strategy: Strategy::Ilp,
            fallback_to_greedy: false,
            ..RunConfig::default()
        };
        let pipeline = Pipeline::new(Some(vec![room_row("R1", 5)]), None, config)
            .unwrap()
            .with_solver(Box::new(Failing));
        let report = pipeline.run(&[record("s1", "c1", 10, 12)]).unwrap();
        assert_eq!(report.outcome.status, SolveStatus::SolverError);
        assert_eq!(report.records[0].room_assignment_status, status::NO_CAPACITY);
    }

    #[test]
    fn inventory_source_unions_and_dedupes_search_hits() {
        let rows = vec![room_row("R1", 30), room_row("R2", 30)];
        let inventory = CatalogInventory::new(rows);
        let config = RunConfig {
            strategy: Strategy::Greedy,
            ..RunConfig::default()
        };
        let pipeline = Pipeline::new(None, Some(Box::new(inventory)), config).unwrap();
        // two overlapping groups both match both rooms in the search
        let records = vec![
            record("s1", "c1", 10, 12),
            record("s2", "c2", 11, 13),
        ];
        let report = pipeline.run(&records).unwrap();
        assert_eq!(report.assigned_count(), 2);
        // dedup: distinct rooms, not one per (group, room) hit
        let mut assigned: Vec<&str> = report
            .records
            .iter()
            .map(|r| r.assigned_room_id.as_str())
            .collect();
        assigned.sort();
        assert_eq!(assigned, vec!["R1", "R2"]);
    }
}
