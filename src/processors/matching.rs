//! Weld-to-schedule matching.

use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::config::ColumnConfig;
use crate::core::loaders::{AnalysisGroups, ScheduleGroups, ScheduleKey, ScheduleTrace, WeldKey};
use crate::core::table::{Cell, Table};

/// Errors from schedule matching. Both stop the batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("no schedule found with {column} {schedule_id} for weld {weld} (DOE {dataset})")]
    UnmatchedSchedule {
        column: String,
        schedule_id: Cell,
        weld: Cell,
        dataset: Cell,
    },

    #[error("weld {weld} (DOE {dataset}) has no {column} column")]
    MissingScheduleId {
        column: String,
        weld: Cell,
        dataset: Cell,
    },
}

/// A weld and the schedule it was recorded against, borrowed from the
/// loaded groups.
#[derive(Debug, Clone, Copy)]
pub struct SchedulePair<'a> {
    pub weld: &'a WeldKey,
    pub analysis: &'a Table,
    pub schedule: &'a ScheduleKey,
    pub trace: &'a ScheduleTrace,
}

/// Pair every weld group with the schedule group of the same DOE whose
/// schedule identifier equals the weld's first-row identifier.
///
/// Schedule groups are indexed once by (DOE, identifier); when several groups
/// share an index entry the first in key order wins. Pairs are returned in
/// weld key order.
///
/// # Errors
///
/// Returns [`MatchError::UnmatchedSchedule`] for the first weld without a
/// schedule. No pairs are returned in that case.
pub fn match_schedules<'a>(
    welds: &'a AnalysisGroups,
    schedules: &'a ScheduleGroups,
    columns: &ColumnConfig,
) -> Result<Vec<SchedulePair<'a>>, MatchError> {
    let mut index: HashMap<(&Cell, &Cell), (&ScheduleKey, &ScheduleTrace)> =
        HashMap::with_capacity(schedules.len());
    for (key, trace) in schedules {
        // The group key holds the identifier every row shares.
        let id = trace.schedule_id.first().unwrap_or(&key.schedule_id);
        index.entry((&key.dataset, id)).or_insert((key, trace));
    }

    let mut pairs = Vec::with_capacity(welds.len());
    for (weld, table) in welds {
        let schedule_id = table
            .first(&columns.schedule_id)
            .ok_or_else(|| MatchError::MissingScheduleId {
                column: columns.schedule_id.clone(),
                weld: weld.weld_id.clone(),
                dataset: weld.dataset.clone(),
            })?;

        let &(schedule, trace) = index
            .get(&(&weld.dataset, schedule_id))
            .ok_or_else(|| MatchError::UnmatchedSchedule {
                column: columns.schedule_id.clone(),
                schedule_id: schedule_id.clone(),
                weld: weld.weld_id.clone(),
                dataset: weld.dataset.clone(),
            })?;

        pairs.push(SchedulePair {
            weld,
            analysis: table,
            schedule,
            trace,
        });
    }

    debug!("matched {} welds to schedules", pairs.len());
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weld_table(schedule_id: f64, dataset: f64) -> Table {
        Table::from_rows(
            vec!["vspotid".into(), "# for DoE Based Model".into()],
            vec![vec![Cell::Number(schedule_id), Cell::Number(dataset)]],
        )
    }

    fn weld_key(weld: &str, dataset: f64) -> WeldKey {
        WeldKey {
            weld_id: Cell::Text(weld.into()),
            dataset: Cell::Number(dataset),
        }
    }

    fn schedule(groups: &mut ScheduleGroups, schedule_id: f64, dataset: f64) -> ScheduleKey {
        let key = ScheduleKey {
            schedule_id: Cell::Number(schedule_id),
            dataset: Cell::Number(dataset),
        };
        groups.insert(
            key.clone(),
            ScheduleTrace {
                msec: vec![1],
                current: vec![1.0],
                schedule_id: vec![Cell::Number(schedule_id)],
            },
        );
        key
    }

    #[test]
    fn test_match_schedules_same_dataset() {
        let columns = ColumnConfig::default();
        let mut schedules = ScheduleGroups::new();
        let s7_doe1 = schedule(&mut schedules, 7.0, 1.0);
        let s7_doe2 = schedule(&mut schedules, 7.0, 2.0);
        schedule(&mut schedules, 8.0, 1.0);

        let mut welds = AnalysisGroups::new();
        welds.insert(weld_key("W1", 1.0), weld_table(7.0, 1.0));
        welds.insert(weld_key("W1", 2.0), weld_table(7.0, 2.0));

        let pairs = match_schedules(&welds, &schedules, &columns).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(*pairs[0].schedule, s7_doe1);
        assert_eq!(*pairs[1].schedule, s7_doe2);
    }

    #[test]
    fn test_match_schedules_every_weld_paired() {
        let columns = ColumnConfig::default();
        let mut schedules = ScheduleGroups::new();
        for id in 1..=5 {
            schedule(&mut schedules, id as f64, 1.0);
        }
        let mut welds = AnalysisGroups::new();
        for w in 0..20 {
            welds.insert(
                weld_key(&format!("W{w}"), 1.0),
                weld_table((w % 5 + 1) as f64, 1.0),
            );
        }

        let pairs = match_schedules(&welds, &schedules, &columns).unwrap();
        assert_eq!(pairs.len(), welds.len());
        for pair in &pairs {
            let weld_sid = pair.analysis.first("vspotid").unwrap();
            assert_eq!(&pair.schedule.schedule_id, weld_sid);
            assert_eq!(pair.schedule.dataset, pair.weld.dataset);
        }
    }

    #[test]
    fn test_match_schedules_unmatched() {
        let columns = ColumnConfig::default();
        let mut schedules = ScheduleGroups::new();
        schedule(&mut schedules, 7.0, 2.0);

        let mut welds = AnalysisGroups::new();
        welds.insert(weld_key("W1", 1.0), weld_table(7.0, 1.0));

        let result = match_schedules(&welds, &schedules, &columns);
        match result {
            Err(MatchError::UnmatchedSchedule { schedule_id, .. }) => {
                assert_eq!(schedule_id, Cell::Number(7.0))
            }
            other => panic!("Expected UnmatchedSchedule, got {:?}", other),
        }
    }
}
