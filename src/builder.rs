use crate::data::{
    AssignmentOutcome, ExamGroup, Objective, RoomRecord, SolveStatus, Strategy,
};
use crate::model::{Cmp, MilpModel, MilpSolver, Sense, VarId};
use log::{info, trace};
use std::time::Duration;

/// The assignment model plus the bookkeeping needed to read a solution
/// back out of it.
pub struct BuiltModel {
    pub model: MilpModel,
    /// (group index, room index, variable) for every admitted x[i,r].
    pub x_vars: Vec<(usize, usize, VarId)>,
    /// Whether any availability-eligible room existed per group.
    pub had_candidates: Vec<bool>,
}

/// Translates batches, rooms, and the overlap relation into a 0/1 program.
///
/// A pair (group, room) gets a variable only when the room's availability
/// window fully contains the group's interval; omitting the variable is
/// equivalent to forcing it to zero. Coverage is the multi-room capacity-sum
/// form: a group may span several rooms whose capacities jointly meet its
/// student count.
pub fn build_model(
    groups: &[ExamGroup],
    rooms: &[RoomRecord],
    overlaps: &[(usize, usize)],
    objective: Objective,
) -> BuiltModel {
    let mut model = MilpModel::new();
    let mut x_vars: Vec<(usize, usize, VarId)> = Vec::new();
    let mut had_candidates = vec![false; groups.len()];

    // x[i,r] = 1 iff group i uses room r, pre-filtered by availability
    for (i, group) in groups.iter().enumerate() {
        for (r, room) in rooms.iter().enumerate() {
            if room.covers(group.start, group.end) {
                let var = model.add_binary(format!("x_{i}_{}", room.id));
                x_vars.push((i, r, var));
                had_candidates[i] = true;
            }
        }
    }
    trace!(
        "Admitted {} assignment variables out of a theoretical maximum of {}",
        x_vars.len(),
        groups.len() * rooms.len()
    );

    // y[r] = 1 iff room r is used at all
    let y_vars: Vec<VarId> = rooms
        .iter()
        .map(|room| model.add_binary(format!("y_{}", room.id)))
        .collect();

    // linking: x[i,r] <= y[r]
    for &(_, r, x) in &x_vars {
        model.add_constraint(vec![(x, 1.0), (y_vars[r], -1.0)], Cmp::Le, 0.0);
    }

    // coverage: Σ_r capacity[r]·x[i,r] >= student_count[i]
    for (i, group) in groups.iter().enumerate() {
        let terms: Vec<(VarId, f64)> = x_vars
            .iter()
            .filter(|&&(gi, _, _)| gi == i)
            .map(|&(_, r, x)| (x, rooms[r].capacity as f64))
            .collect();
        model.add_constraint(terms, Cmp::Ge, group.student_count as f64);
    }

    // no double-booking: x[i,r] + x[j,r] <= 1 for overlapping (i, j)
    for &(i, j) in overlaps {
        for r in 0..rooms.len() {
            let xi = x_vars.iter().find(|&&(gi, ri, _)| gi == i && ri == r);
            let xj = x_vars.iter().find(|&&(gj, rj, _)| gj == j && rj == r);
            if let (Some(&(_, _, xi)), Some(&(_, _, xj))) = (xi, xj) {
                model.add_constraint(vec![(xi, 1.0), (xj, 1.0)], Cmp::Le, 1.0);
            }
        }
    }

    let objective_terms: Vec<(VarId, f64)> = match objective {
        Objective::MinimizeRooms => y_vars.iter().map(|&y| (y, 1.0)).collect(),
        Objective::MinimizeWeighted => x_vars
            .iter()
            .map(|&(_, r, x)| (x, 1.0 / rooms[r].capacity.max(1) as f64))
            .collect(),
    };
    model.set_objective(objective_terms, Sense::Minimize);

    info!(
        "Built assignment model: {} groups, {} rooms, {} variables, {} constraints",
        groups.len(),
        rooms.len(),
        model.num_vars(),
        model.num_constraints()
    );

    BuiltModel {
        model,
        x_vars,
        had_candidates,
    }
}

/// Builds the model, runs the solver within `time_limit`, and translates the
/// variable values into an [`AssignmentOutcome`].
///
/// TIME_LIMIT with an incumbent is a usable sub-optimal assignment;
/// INFEASIBLE and SOLVER_ERROR come back with an empty mapping. Groups with
/// no availability-eligible room make the model trivially infeasible, so
/// that case is detected before invoking the solver.
pub fn solve_assignment(
    groups: &[ExamGroup],
    rooms: &[RoomRecord],
    overlaps: &[(usize, usize)],
    objective: Objective,
    solver: &dyn MilpSolver,
    time_limit: Duration,
) -> AssignmentOutcome {
    if groups.is_empty() {
        let mut outcome = AssignmentOutcome::empty(0, SolveStatus::Optimal, Strategy::Ilp);
        outcome.objective_value = Some(0.0);
        return outcome;
    }
    if rooms.is_empty() {
        info!("No rooms in catalog; ILP run is infeasible by construction");
        return AssignmentOutcome::empty(groups.len(), SolveStatus::Infeasible, Strategy::Ilp);
    }

    let built = build_model(groups, rooms, overlaps, objective);

    if let Some(i) = built.had_candidates.iter().position(|&c| !c) {
        info!(
            "Group {i} ({} -> {}) has no availability-eligible room; model is infeasible",
            groups[i].start, groups[i].end
        );
        let mut outcome =
            AssignmentOutcome::empty(groups.len(), SolveStatus::Infeasible, Strategy::Ilp);
        outcome.had_candidates = built.had_candidates;
        return outcome;
    }

    let solved = solver.solve(&built.model, time_limit);

    let mut assignments = vec![Vec::new(); groups.len()];
    if solved.status.is_usable() && !solved.values.is_empty() {
        for &(i, r, x) in &built.x_vars {
            if solved.values[x] > 0.5 {
                assignments[i].push(r);
            }
        }
    }

    AssignmentOutcome {
        assignments,
        had_candidates: built.had_candidates,
        status: solved.status,
        objective_value: solved.objective_value,
        solve_time: solved.elapsed,
        strategy: Strategy::Ilp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SolveOutcome;
    use chrono::{NaiveDate, NaiveDateTime};

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

    /// Backend stub that replays a canned outcome, for exercising the
    /// model-to-outcome translation without a real solve.
    struct Canned(SolveOutcome);

    impl MilpSolver for Canned {
        fn solve(&self, _model: &MilpModel, _time_limit: Duration) -> SolveOutcome {
            self.0.clone()
        }
    }

    #[test]
    fn availability_prunes_variables() {
        let groups = vec![group(10, 12, 5)];
        let rooms = vec![
            room("R1", 10, Some((8, 22))),
            room("R2", 10, Some((13, 22))), // cannot host the 10-12 group
            room("R3", 10, None),
        ];
        let built = build_model(&groups, &rooms, &[], Objective::MinimizeRooms);
        assert_eq!(built.x_vars.len(), 2);
        assert!(built.had_candidates[0]);
        let admitted: Vec<&str> = built
            .x_vars
            .iter()
            .map(|&(_, r, _)| rooms[r].id.as_str())
            .collect();
        assert_eq!(admitted, vec!["R1", "R3"]);
    }

    #[test]
    fn model_has_link_coverage_and_overlap_constraints() {
        let groups = vec![group(10, 12, 18), group(11, 13, 10)];
        let rooms = vec![room("R1", 20, None), room("R2", 12, None)];
        let overlaps = vec![(0, 1)];
        let built = build_model(&groups, &rooms, &overlaps, Objective::MinimizeRooms);
        // 4 x vars + 2 y vars
        assert_eq!(built.model.num_vars(), 6);
        // 4 linking + 2 coverage + 2 no-overlap (one per room)
        assert_eq!(built.model.num_constraints(), 8);
    }

    #[test]
    fn weighted_objective_uses_inverse_capacity_coefficients() {
        let groups = vec![group(10, 12, 5)];
        let rooms = vec![room("R1", 50, None), room("R2", 10, None)];
        let built = build_model(&groups, &rooms, &[], Objective::MinimizeWeighted);
        let coeffs: Vec<f64> = built.model.objective().iter().map(|&(_, c)| c).collect();
        assert_eq!(coeffs, vec![1.0 / 50.0, 1.0 / 10.0]);
    }

    #[test]
    fn group_without_candidates_is_infeasible_before_solving() {
        let groups = vec![group(10, 12, 5)];
        let rooms = vec![room("R1", 30, Some((14, 22)))];
        let canned = Canned(SolveOutcome {
            status: SolveStatus::Optimal,
            objective_value: Some(0.0),
            values: Vec::new(),
            elapsed: Duration::ZERO,
        });
        let outcome = solve_assignment(
            &groups,
            &rooms,
            &[],
            Objective::MinimizeRooms,
            &canned,
            Duration::from_secs(1),
        );
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.assignments[0].is_empty());
        assert!(!outcome.had_candidates[0]);
    }

    #[test]
    fn translates_variable_values_into_room_lists() {
        let groups = vec![group(10, 12, 18), group(11, 13, 10)];
        let rooms = vec![room("R1", 20, None), room("R2", 12, None)];
        // x vars in build order: (0,R1) (0,R2) (1,R1) (1,R2), then y_R1 y_R2
        let canned = Canned(SolveOutcome {
            status: SolveStatus::Optimal,
            objective_value: Some(2.0),
            values: vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            elapsed: Duration::from_millis(3),
        });
        let outcome = solve_assignment(
            &groups,
            &rooms,
            &[(0, 1)],
            Objective::MinimizeRooms,
            &canned,
            Duration::from_secs(1),
        );
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.room_ids(0, &rooms), vec!["R1"]);
        assert_eq!(outcome.room_ids(1, &rooms), vec!["R2"]);
        assert_eq!(outcome.objective_value, Some(2.0));
    }

    #[test]
    fn solver_error_yields_empty_assignment() {
        let groups = vec![group(10, 12, 5)];
        let rooms = vec![room("R1", 30, None)];
        let canned = Canned(SolveOutcome {
            status: SolveStatus::SolverError,
            objective_value: None,
            values: Vec::new(),
            elapsed: Duration::ZERO,
        });
        let outcome = solve_assignment(
            &groups,
            &rooms,
            &[],
            Objective::MinimizeRooms,
            &canned,
            Duration::from_secs(1),
        );
        assert_eq!(outcome.status, SolveStatus::SolverError);
        assert!(outcome.assignments[0].is_empty());
        assert!(outcome.had_candidates[0]);
    }
}
