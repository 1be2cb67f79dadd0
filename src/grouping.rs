use crate::data::{ExamGroup, ExamRecord};
use chrono::NaiveDateTime;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Why a record was left out of grouping, or which group it landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Grouped(usize),
    /// Schedule status was not SCHEDULED.
    NotScheduled,
    /// Start or end timestamp missing.
    InvalidTimes,
}

/// The batch partition for one run: ordered groups plus a per-record
/// disposition aligned with the input slice.
#[derive(Debug, Clone)]
pub struct Grouping {
    pub groups: Vec<ExamGroup>,
    pub dispositions: Vec<Disposition>,
}

impl Grouping {
    pub fn iter(&self) -> impl Iterator<Item = &ExamGroup> {
        self.groups.iter()
    }

    pub fn group_of(&self, record_idx: usize) -> Option<usize> {
        match self.dispositions.get(record_idx) {
            Some(Disposition::Grouped(g)) => Some(*g),
            _ => None,
        }
    }
}

/// Partitions exam records into time-coincident batches.
///
/// Only records with status SCHEDULED and both timestamps present are
/// grouped; the rest are tagged for downstream status annotation. The
/// grouping key is the exact (start, end) pair, so two exams starting
/// together but ending apart land in different groups. Output is ordered
/// by start time ascending, stable on first-seen order, which keeps the
/// partition deterministic across runs on identical input.
pub fn group_exams(records: &[ExamRecord]) -> Grouping {
    let mut dispositions = vec![Disposition::NotScheduled; records.len()];
    let mut key_index: HashMap<(NaiveDateTime, NaiveDateTime), usize> = HashMap::new();
    let mut groups: Vec<ExamGroup> = Vec::new();
    // distinct (student, crn) pairs per group
    let mut seen_pairs: Vec<HashSet<(String, String)>> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        if !record.is_scheduled() {
            continue;
        }
        let (start, end) = match (record.scheduled_start, record.scheduled_end) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                dispositions[idx] = Disposition::InvalidTimes;
                continue;
            }
        };

        let gi = *key_index.entry((start, end)).or_insert_with(|| {
            groups.push(ExamGroup {
                start,
                end,
                student_count: 0,
                student_ids: Vec::new(),
                crns: Vec::new(),
                members: Vec::new(),
            });
            seen_pairs.push(HashSet::new());
            groups.len() - 1
        });

        let group = &mut groups[gi];
        group.members.push(idx);
        group.student_ids.push(record.student_id.clone());
        if !group.crns.contains(&record.crn) {
            group.crns.push(record.crn.clone());
        }
        if seen_pairs[gi].insert((record.student_id.clone(), record.crn.clone())) {
            group.student_count += 1;
        }
        dispositions[idx] = Disposition::Grouped(gi);
    }

    // Stable sort keeps first-seen order among groups sharing a start time.
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by_key(|&i| groups[i].start);

    let mut remap = vec![0usize; groups.len()];
    for (new_idx, &old_idx) in order.iter().enumerate() {
        remap[old_idx] = new_idx;
    }
    for d in dispositions.iter_mut() {
        if let Disposition::Grouped(g) = d {
            *g = remap[*g];
        }
    }
    let mut ordered = Vec::with_capacity(groups.len());
    let mut by_old: HashMap<usize, ExamGroup> =
        groups.into_iter().enumerate().collect();
    for &old_idx in &order {
        if let Some(g) = by_old.remove(&old_idx) {
            ordered.push(g);
        }
    }

    info!(
        "Grouped {} records into {} exam time slots ({} skipped)",
        records.len(),
        ordered.len(),
        dispositions
            .iter()
            .filter(|d| !matches!(d, Disposition::Grouped(_)))
            .count()
    );

    Grouping {
        groups: ordered,
        dispositions,
    }
}

/// Unordered index pairs (i, j), i < j, of groups whose half-open intervals
/// intersect. Both strategies use this relation to forbid room sharing.
/// Quadratic, which is fine at the batch counts seen in practice.
pub fn overlap_pairs(groups: &[ExamGroup]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            if groups[i].overlaps(&groups[j]) {
                pairs.push((i, j));
            }
        }
    }
    debug!(
        "Overlap relation: {} of {} group pairs intersect",
        pairs.len(),
        groups.len() * groups.len().saturating_sub(1) / 2
    );
    pairs
}
