/*!
 * Selection Policies
 * Per-algorithm queue state and the single dispatch point
 */

use crate::core::limits::FEEDBACK_LEVELS;
use crate::core::types::Pid;
use crate::scheduler::entry::ScheduledProcess;
use crate::scheduler::types::SchedulingAlgorithm;
use std::collections::{HashMap, VecDeque};

/// Auxiliary queue state per algorithm; ranking data lives on the entries
#[derive(Debug)]
pub(super) enum QueueState {
    Priority,
    RoundRobin(VecDeque<Pid>),
    Multilevel(Vec<VecDeque<Pid>>),
    Fair,
}

impl QueueState {
    /// Build queues for an algorithm from the current table, preserving
    /// feedback levels already recorded on the entries
    pub fn rebuild(
        algorithm: SchedulingAlgorithm,
        table: &HashMap<Pid, ScheduledProcess>,
    ) -> Self {
        let mut pids: Vec<Pid> = table.keys().copied().collect();
        pids.sort_unstable();
        match algorithm {
            SchedulingAlgorithm::PriorityBased => Self::Priority,
            SchedulingAlgorithm::Fair => Self::Fair,
            SchedulingAlgorithm::RoundRobin => Self::RoundRobin(pids.into_iter().collect()),
            SchedulingAlgorithm::MultilevelFeedback => {
                let mut queues = vec![VecDeque::new(); FEEDBACK_LEVELS];
                for pid in pids {
                    let level = table[&pid].queue_level.min(FEEDBACK_LEVELS - 1);
                    queues[level].push_back(pid);
                }
                Self::Multilevel(queues)
            }
        }
    }

    /// Register a newly admitted pid
    pub fn admit(&mut self, pid: Pid) {
        match self {
            Self::Priority | Self::Fair => {}
            Self::RoundRobin(queue) => queue.push_back(pid),
            // Fresh processes enter at the highest level
            Self::Multilevel(queues) => queues[0].push_back(pid),
        }
    }

    /// Forget a vanished pid
    pub fn remove(&mut self, pid: Pid) {
        match self {
            Self::Priority | Self::Fair => {}
            Self::RoundRobin(queue) => queue.retain(|p| *p != pid),
            Self::Multilevel(queues) => {
                for queue in queues {
                    queue.retain(|p| *p != pid);
                }
            }
        }
    }
}

/// Choose the next process; mutates queue rotation and feedback levels
pub(super) fn select_next(
    state: &mut QueueState,
    table: &mut HashMap<Pid, ScheduledProcess>,
) -> Option<Pid> {
    match state {
        QueueState::Priority => select_priority(table),
        QueueState::Fair => select_fair(table),
        QueueState::RoundRobin(queue) => select_round_robin(queue, table),
        QueueState::Multilevel(queues) => select_multilevel(queues, table),
    }
}

/// Highest ranking value wins; smallest pid breaks ties
fn select_priority(table: &HashMap<Pid, ScheduledProcess>) -> Option<Pid> {
    table
        .values()
        .max_by(|a, b| {
            a.dynamic_priority
                .cmp(&b.dynamic_priority)
                .then(b.pid.cmp(&a.pid))
        })
        .map(|e| e.pid)
}

/// Lowest virtual runtime wins; smallest pid breaks ties
fn select_fair(table: &HashMap<Pid, ScheduledProcess>) -> Option<Pid> {
    table
        .values()
        .min_by(|a, b| {
            a.virtual_runtime
                .partial_cmp(&b.virtual_runtime)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.pid.cmp(&b.pid))
        })
        .map(|e| e.pid)
}

/// FIFO rotation, skipping entries whose pid has disappeared
fn select_round_robin(
    queue: &mut VecDeque<Pid>,
    table: &HashMap<Pid, ScheduledProcess>,
) -> Option<Pid> {
    while let Some(pid) = queue.pop_front() {
        if table.contains_key(&pid) {
            queue.push_back(pid);
            return Some(pid);
        }
    }
    None
}

/// Lowest-index non-empty level wins; repeat selections demote
fn select_multilevel(
    queues: &mut [VecDeque<Pid>],
    table: &mut HashMap<Pid, ScheduledProcess>,
) -> Option<Pid> {
    for level in 0..queues.len() {
        let pid = loop {
            match queues[level].pop_front() {
                Some(pid) if table.contains_key(&pid) => break Some(pid),
                Some(_) => continue, // vanished, drop it
                None => break None,
            }
        };
        let Some(pid) = pid else { continue };

        let entry = table.get_mut(&pid).expect("pid checked present");
        entry.level_runs += 1;
        let demote_after = ((level + 1) * 3) as u32;
        let next_level = if entry.level_runs > demote_after {
            entry.level_runs = 0;
            (level + 1).min(queues.len() - 1)
        } else {
            level
        };
        entry.queue_level = next_level;
        queues[next_level].push_back(pid);
        return Some(pid);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::types::ProcessClass;
    use std::time::Duration;

    fn table_of(pids: &[Pid]) -> HashMap<Pid, ScheduledProcess> {
        pids.iter()
            .map(|pid| {
                (
                    *pid,
                    ScheduledProcess::new(
                        *pid,
                        format!("p{}", pid),
                        0,
                        ProcessClass::Interactive,
                        Duration::from_millis(50),
                    ),
                )
            })
            .collect()
    }

    #[test]
    fn test_priority_argmax_with_pid_tiebreak() {
        let mut table = table_of(&[3, 1, 2]);
        table.get_mut(&2).unwrap().dynamic_priority = 10;
        let mut state = QueueState::Priority;
        assert_eq!(select_next(&mut state, &mut table), Some(2));

        table.get_mut(&2).unwrap().dynamic_priority = 0;
        // All equal now; smallest pid wins
        assert_eq!(select_next(&mut state, &mut table), Some(1));
    }

    #[test]
    fn test_round_robin_rotation_skips_dead() {
        let mut table = table_of(&[1, 2, 3]);
        let mut state = QueueState::rebuild(SchedulingAlgorithm::RoundRobin, &table);

        assert_eq!(select_next(&mut state, &mut table), Some(1));
        assert_eq!(select_next(&mut state, &mut table), Some(2));
        table.remove(&3);
        assert_eq!(select_next(&mut state, &mut table), Some(1));
        assert_eq!(select_next(&mut state, &mut table), Some(2));
    }

    #[test]
    fn test_fair_argmin_with_pid_tiebreak() {
        let mut table = table_of(&[5, 6]);
        table.get_mut(&6).unwrap().virtual_runtime = 1.0;
        let mut state = QueueState::Fair;
        assert_eq!(select_next(&mut state, &mut table), Some(5));

        table.get_mut(&5).unwrap().virtual_runtime = 1.0;
        assert_eq!(select_next(&mut state, &mut table), Some(5));
    }

    #[test]
    fn test_multilevel_demotes_after_repeat_selection() {
        let mut table = table_of(&[9]);
        let mut state = QueueState::rebuild(SchedulingAlgorithm::MultilevelFeedback, &table);

        for _ in 0..4 {
            assert_eq!(select_next(&mut state, &mut table), Some(9));
        }
        // Fourth selection exceeded (0+1)*3 and demoted
        assert_eq!(table[&9].queue_level, 1);

        // Keep selecting; the level may only ever go deeper, capped at the last
        let mut max_seen = 1;
        for _ in 0..200 {
            select_next(&mut state, &mut table);
            let level = table[&9].queue_level;
            assert!(level >= max_seen || level == FEEDBACK_LEVELS - 1);
            max_seen = max_seen.max(level);
        }
        assert_eq!(table[&9].queue_level, FEEDBACK_LEVELS - 1);
    }

    #[test]
    fn test_multilevel_prefers_highest_level() {
        let mut table = table_of(&[1, 2]);
        table.get_mut(&2).unwrap().queue_level = 2;
        let mut state = QueueState::rebuild(SchedulingAlgorithm::MultilevelFeedback, &table);
        assert_eq!(select_next(&mut state, &mut table), Some(1));
    }

    #[test]
    fn test_empty_table_selects_none() {
        let mut table = HashMap::new();
        for algorithm in [
            SchedulingAlgorithm::PriorityBased,
            SchedulingAlgorithm::RoundRobin,
            SchedulingAlgorithm::MultilevelFeedback,
            SchedulingAlgorithm::Fair,
        ] {
            let mut state = QueueState::rebuild(algorithm, &table);
            assert_eq!(select_next(&mut state, &mut table), None);
        }
    }
}
