//! Dependency scheduler for Gantt tasks
//!
//! A task without dependencies starts on its stored start date. A task with
//! dependencies starts on the latest end date among its prerequisites, where
//! `end = effective start + duration`. Prerequisites with no resolvable start
//! or no duration, unknown tasks, and edges that close a cycle contribute no
//! constraint.

use super::models::{GanttTaskData, TaskId};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub task_id: TaskId,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Start comes from the dependencies rather than a stored date
    pub derived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
    /// Tasks reached again while their own start was being resolved
    pub cycles: Vec<TaskId>,
}

impl Schedule {
    pub fn entry(&self, task_id: TaskId) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.task_id == task_id)
    }
}

pub struct DependencyScheduler {
    rows: HashMap<TaskId, GanttTaskData>,
}

#[derive(Clone, Copy)]
enum Mark {
    Visiting,
    Resolved(Option<NaiveDate>),
}

struct Resolver<'a> {
    rows: &'a HashMap<TaskId, GanttTaskData>,
    marks: HashMap<TaskId, Mark>,
    cycles: BTreeSet<TaskId>,
}

impl<'a> Resolver<'a> {
    fn new(rows: &'a HashMap<TaskId, GanttTaskData>) -> Self {
        Self {
            rows,
            marks: HashMap::new(),
            cycles: BTreeSet::new(),
        }
    }

    fn start(&mut self, task_id: TaskId) -> Option<NaiveDate> {
        match self.marks.get(&task_id) {
            Some(Mark::Resolved(start)) => return *start,
            Some(Mark::Visiting) => {
                self.cycles.insert(task_id);
                return None;
            }
            None => {}
        }

        let rows = self.rows;
        let row = rows.get(&task_id)?;
        self.marks.insert(task_id, Mark::Visiting);

        let start = if row.dependencies.is_empty() {
            row.start_date
        } else {
            row.dependencies
                .iter()
                .filter_map(|dep| self.end(*dep))
                .max()
                .or(row.start_date)
        };

        self.marks.insert(task_id, Mark::Resolved(start));
        start
    }

    fn end(&mut self, task_id: TaskId) -> Option<NaiveDate> {
        let start = self.start(task_id)?;
        let duration = self.rows.get(&task_id)?.duration_days?;
        start.checked_add_days(Days::new(u64::from(duration)))
    }
}

impl DependencyScheduler {
    pub fn new(rows: impl IntoIterator<Item = GanttTaskData>) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (r.task_id, r)).collect(),
        }
    }

    pub fn row(&self, task_id: TaskId) -> Option<&GanttTaskData> {
        self.rows.get(&task_id)
    }

    /// Effective start date of `task_id`
    pub fn earliest_start(&self, task_id: TaskId) -> Option<NaiveDate> {
        Resolver::new(&self.rows).start(task_id)
    }

    pub fn end_date(&self, task_id: TaskId) -> Option<NaiveDate> {
        Resolver::new(&self.rows).end(task_id)
    }

    /// Resolve every row, sharing work across the whole set
    pub fn schedule(&self) -> Schedule {
        let mut resolver = Resolver::new(&self.rows);
        let mut ids: Vec<TaskId> = self.rows.keys().copied().collect();
        ids.sort();

        let entries = ids
            .into_iter()
            .map(|task_id| {
                let start_date = resolver.start(task_id);
                let end_date = resolver.end(task_id);
                let derived = self
                    .rows
                    .get(&task_id)
                    .is_some_and(|r| !r.dependencies.is_empty());
                ScheduleEntry {
                    task_id,
                    start_date,
                    end_date,
                    derived,
                }
            })
            .collect();

        Schedule {
            entries,
            cycles: resolver.cycles.into_iter().collect(),
        }
    }

    /// Whether giving `task_id` the dependency set `dependencies` would close
    /// a cycle. Returns the dependency through which `task_id` is reached.
    ///
    /// Breadth-first walk along existing dependency edges; the current edges
    /// of `task_id` itself are ignored since they are being replaced.
    pub fn would_create_cycle(&self, task_id: TaskId, dependencies: &[TaskId]) -> Option<TaskId> {
        for &dep in dependencies {
            if dep == task_id {
                return Some(dep);
            }

            let mut visited: HashSet<TaskId> = HashSet::new();
            let mut queue: VecDeque<TaskId> = VecDeque::from([dep]);

            while let Some(current) = queue.pop_front() {
                if current == task_id {
                    return Some(dep);
                }
                if !visited.insert(current) {
                    continue;
                }
                if let Some(row) = self.rows.get(&current) {
                    queue.extend(
                        row.dependencies
                            .iter()
                            .filter(|next| !visited.contains(*next)),
                    );
                }
            }
        }
        None
    }
}
