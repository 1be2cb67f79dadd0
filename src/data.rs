use chrono::{Duration as TimeDelta, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AssignError;

/// Schedule status value that marks an exam as eligible for room assignment.
pub const SCHEDULED: &str = "SCHEDULED";

/// Room-assignment status strings written back onto exam records.
pub mod status {
    pub const NOT_SCHEDULED: &str = "No room needed - exam not scheduled";
    pub const INVALID_TIME_SLOT: &str = "Invalid time slot";
    pub const NO_ROOMS_AVAILABLE: &str = "No rooms available";
    pub const NO_CAPACITY: &str = "No available rooms with capacity";
    pub const ASSIGNED_ILP: &str = "Assigned (ILP)";
    pub const ASSIGNED_GREEDY: &str = "Assigned (Greedy)";
    pub const ROOMS_FULL: &str = "All assigned rooms at capacity";
}

/// One student-course exam instance, as produced by the upstream scheduler.
///
/// Unknown input columns are preserved in `extra` and echoed back on output.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub student_id: String,
    pub crn: String,
    pub schedule_status: String,
    #[serde(default)]
    pub scheduled_start: Option<NaiveDateTime>,
    #[serde(default)]
    pub scheduled_end: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assigned_room_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assigned_room_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assigned_room_location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub room_assignment_status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExamRecord {
    pub fn is_scheduled(&self) -> bool {
        self.schedule_status == SCHEDULED
    }
}

/// A batch of exam records sharing identical start and end timestamps.
///
/// Groups reference their member records by index into the input slice;
/// the group and the records share the lifetime of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamGroup {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub student_count: u32,
    pub student_ids: Vec<String>,
    pub crns: Vec<String>,
    pub members: Vec<usize>,
}

impl ExamGroup {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Half-open interval intersection with another group.
    pub fn overlaps(&self, other: &ExamGroup) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }
}

/// A bookable room after catalog normalization.
///
/// `window == None` means the room is available for the full scheduling
/// horizon. Duplicate ids are permitted and treated as independent units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub id: String,
    pub capacity: u32,
    pub window: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl RoomRecord {
    /// Whether `[start, end)` lies fully inside this room's availability.
    pub fn covers(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        match self.window {
            Some((ws, we)) => ws <= start && end <= we,
            None => true,
        }
    }
}

/// A raw room row as received from a catalog or inventory adapter, keyed by
/// whatever column labels the source uses.
pub type RawRoomRow = Map<String, Value>;

/// Run-level status of one assignment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    TimeLimit,
    SolverError,
    HeuristicOk,
}

impl SolveStatus {
    /// TIME_LIMIT with an incumbent is usable; so are OPTIMAL and the
    /// greedy result.
    pub fn is_usable(self) -> bool {
        matches!(
            self,
            SolveStatus::Optimal | SolveStatus::TimeLimit | SolveStatus::HeuristicOk
        )
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::TimeLimit => "TIME_LIMIT",
            SolveStatus::SolverError => "SOLVER_ERROR",
            SolveStatus::HeuristicOk => "HEURISTIC_OK",
        };
        f.write_str(s)
    }
}

/// Which assignment strategy produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Ilp,
    Greedy,
}

impl FromStr for Strategy {
    type Err = AssignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ilp" => Ok(Strategy::Ilp),
            "greedy" => Ok(Strategy::Greedy),
            other => Err(AssignError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Objective for the ILP formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Minimize the number of distinct rooms used.
    MinimizeRooms,
    /// Minimize capacity-weighted usage, biasing toward smaller rooms.
    MinimizeWeighted,
}

impl FromStr for Objective {
    type Err = AssignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimize_rooms" => Ok(Objective::MinimizeRooms),
            "minimize_weighted" => Ok(Objective::MinimizeWeighted),
            other => Err(AssignError::UnknownObjective(other.to_string())),
        }
    }
}

/// Result of one assignment run, from either strategy.
///
/// `assignments[i]` lists the catalog indices of the room units covering
/// group `i`, in order (empty when the group could not be assigned).
/// Indices, not ids: duplicate ids are independent bookable units with
/// their own capacities, and the index pins down which unit was chosen.
/// `had_candidates[i]` records whether any availability-eligible room
/// existed for the group at all.
#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub assignments: Vec<Vec<usize>>,
    pub had_candidates: Vec<bool>,
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub solve_time: Duration,
    pub strategy: Strategy,
}

impl AssignmentOutcome {
    /// An outcome with no assignments, used for the failure statuses.
    pub fn empty(n_groups: usize, status: SolveStatus, strategy: Strategy) -> Self {
        AssignmentOutcome {
            assignments: vec![Vec::new(); n_groups],
            had_candidates: vec![false; n_groups],
            status,
            objective_value: None,
            solve_time: Duration::ZERO,
            strategy,
        }
    }

    /// The assigned room ids for one group, resolved against the catalog.
    pub fn room_ids(&self, group: usize, rooms: &[RoomRecord]) -> Vec<String> {
        self.assignments[group]
            .iter()
            .map(|&r| rooms[r].id.clone())
            .collect()
    }
}

/// Configuration for one assignment run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub strategy: Strategy,
    pub objective: Objective,
    pub time_limit: Duration,
    /// Rerun with the greedy strategy when the ILP path fails outright.
    pub fallback_to_greedy: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            strategy: Strategy::Ilp,
            objective: Objective::MinimizeRooms,
            time_limit: Duration::from_secs(30),
            fallback_to_greedy: true,
        }
    }
}
