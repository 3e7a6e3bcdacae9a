//! Drag-and-drop transition table
//!
//! `plan_transition` decides what a drag gesture does to a card without
//! performing any write. The executor in `manager` runs the side effect.
//!
//! | Source          | Destination         | Effect                          |
//! |-----------------|---------------------|---------------------------------|
//! | any             | nowhere             | none                            |
//! | column X        | column X            | none (local reorder at most)    |
//! | active column   | other active column | `UpdateStatus(dest status)`     |
//! | active column   | archive column/zone | `Archive`, status kept          |
//! | archive column  | active column       | `Unarchive(dest status)`        |
//! | archive column  | archive zone        | none                            |

use super::columns::{BoardLayout, ColumnKind};
use super::error::WorkflowError;
use super::models::{CardState, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

/// A slot inside a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropPosition {
    pub column: String,
    pub index: usize,
}

impl DropPosition {
    pub fn new(column: impl Into<String>, index: usize) -> Self {
        Self {
            column: column.into(),
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropTarget {
    Column(DropPosition),
    /// The always-present archive control, separate from the columns
    ArchiveZone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragGesture {
    pub task_id: TaskId,
    pub source: DropPosition,
    /// `None` when the card was dropped outside every target
    pub destination: Option<DropTarget>,
}

impl DragGesture {
    pub fn to_column(task_id: TaskId, source: DropPosition, destination: DropPosition) -> Self {
        Self {
            task_id,
            source,
            destination: Some(DropTarget::Column(destination)),
        }
    }

    pub fn to_archive_zone(task_id: TaskId, source: DropPosition) -> Self {
        Self {
            task_id,
            source,
            destination: Some(DropTarget::ArchiveZone),
        }
    }
}

/// Store write a transition requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SideEffect {
    None,
    UpdateStatus { status: TaskStatus },
    /// Atomic server-side archive; status untouched
    Archive,
    /// One write clearing the archive flag and setting the status
    Unarchive { status: TaskStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: CardState,
    pub to: CardState,
    pub effect: SideEffect,
}

impl Transition {
    fn stay(state: CardState) -> Self {
        Self {
            from: state,
            to: state,
            effect: SideEffect::None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.effect == SideEffect::None
    }
}

/// Decide the transition for `gesture` applied to a card in `current`.
///
/// Pure: no writes, no I/O. Unknown column ids are rejected.
pub fn plan_transition(
    layout: &BoardLayout,
    current: CardState,
    gesture: &DragGesture,
) -> Result<Transition, WorkflowError> {
    layout.require(&gesture.source.column)?;

    let destination = match &gesture.destination {
        None => return Ok(Transition::stay(current)),
        Some(destination) => destination,
    };

    let target_kind = match destination {
        DropTarget::ArchiveZone => ColumnKind::Archive,
        DropTarget::Column(position) => {
            let column = layout.require(&position.column)?;
            if position.column == gesture.source.column {
                return Ok(Transition::stay(current));
            }
            column.kind
        }
    };

    let transition = match (current.archived, target_kind) {
        (false, ColumnKind::Archive) => Transition {
            from: current,
            to: CardState::archived(current.status),
            effect: SideEffect::Archive,
        },
        (true, ColumnKind::Archive) => Transition::stay(current),
        (true, ColumnKind::Status(status)) => Transition {
            from: current,
            to: CardState::active(status),
            effect: SideEffect::Unarchive { status },
        },
        (false, ColumnKind::Status(status)) if status == current.status => {
            Transition::stay(current)
        }
        (false, ColumnKind::Status(status)) => Transition {
            from: current,
            to: CardState::active(status),
            effect: SideEffect::UpdateStatus { status },
        },
    };

    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn gesture(source: &str, destination: Option<DropTarget>) -> DragGesture {
        DragGesture {
            task_id: Uuid::new_v4(),
            source: DropPosition::new(source, 0),
            destination,
        }
    }

    fn to(column: &str, index: usize) -> Option<DropTarget> {
        Some(DropTarget::Column(DropPosition::new(column, index)))
    }

    #[test]
    fn test_same_column_same_index_is_noop() {
        let layout = BoardLayout::default();
        let state = CardState::active(TaskStatus::InProgress);
        let t = plan_transition(&layout, state, &gesture("in_progress", to("in_progress", 0)))
            .unwrap();
        assert!(t.is_noop());
        assert_eq!(t.to, state);
    }

    #[test]
    fn test_same_column_reorder_issues_no_write() {
        let layout = BoardLayout::default();
        let state = CardState::active(TaskStatus::Pending);
        let t = plan_transition(&layout, state, &gesture("pending", to("pending", 4))).unwrap();
        assert!(t.is_noop());
    }

    #[test]
    fn test_drop_outside_targets_is_noop() {
        let layout = BoardLayout::default();
        let state = CardState::active(TaskStatus::Stuck);
        let t = plan_transition(&layout, state, &gesture("stuck", None)).unwrap();
        assert!(t.is_noop());
    }

    #[test]
    fn test_active_to_active_updates_status_only() {
        let layout = BoardLayout::default();
        let state = CardState::active(TaskStatus::NotStarted);
        let t = plan_transition(&layout, state, &gesture("not_started", to("completed", 2)))
            .unwrap();
        assert_eq!(
            t.effect,
            SideEffect::UpdateStatus {
                status: TaskStatus::Completed
            }
        );
        assert_eq!(t.to, CardState::active(TaskStatus::Completed));
    }

    #[test]
    fn test_active_to_archive_column_or_zone_keeps_status() {
        let layout = BoardLayout::default();
        let state = CardState::active(TaskStatus::Stuck);

        let via_column = plan_transition(&layout, state, &gesture("stuck", to("archived", 0)))
            .unwrap();
        let via_zone =
            plan_transition(&layout, state, &gesture("stuck", Some(DropTarget::ArchiveZone)))
                .unwrap();

        for t in [via_column, via_zone] {
            assert_eq!(t.effect, SideEffect::Archive);
            assert_eq!(t.to, CardState::archived(TaskStatus::Stuck));
        }
    }

    #[test]
    fn test_archive_to_active_takes_destination_status() {
        let layout = BoardLayout::default();
        let state = CardState::archived(TaskStatus::Stuck);
        let t = plan_transition(&layout, state, &gesture("archived", to("in_progress", 0)))
            .unwrap();
        assert_eq!(
            t.effect,
            SideEffect::Unarchive {
                status: TaskStatus::InProgress
            }
        );
        assert_eq!(t.to, CardState::active(TaskStatus::InProgress));
    }

    #[test]
    fn test_unarchive_into_original_status_still_writes() {
        let layout = BoardLayout::default();
        let state = CardState::archived(TaskStatus::Pending);
        let t = plan_transition(&layout, state, &gesture("archived", to("pending", 0))).unwrap();
        assert_eq!(
            t.effect,
            SideEffect::Unarchive {
                status: TaskStatus::Pending
            }
        );
    }

    #[test]
    fn test_archived_card_to_archive_zone_is_noop() {
        let layout = BoardLayout::default();
        let state = CardState::archived(TaskStatus::Completed);
        let t = plan_transition(&layout, state, &gesture("archived", Some(DropTarget::ArchiveZone)))
            .unwrap();
        assert!(t.is_noop());
    }

    #[test]
    fn test_every_state_has_an_outgoing_transition() {
        let layout = BoardLayout::default();
        for status in TaskStatus::ALL {
            let other = TaskStatus::ALL.into_iter().find(|s| *s != status).unwrap();
            let other_column = layout
                .column_for(CardState::active(other))
                .unwrap()
                .id
                .clone();

            let active = CardState::active(status);
            let source = layout.column_for(active).unwrap().id.clone();
            let t = plan_transition(&layout, active, &gesture(&source, to(&other_column, 0)))
                .unwrap();
            assert!(!t.is_noop());

            let archived = CardState::archived(status);
            let t = plan_transition(&layout, archived, &gesture("archived", to(&other_column, 0)))
                .unwrap();
            assert!(!t.is_noop());
        }
    }

    #[test]
    fn test_unknown_columns_are_rejected() {
        let layout = BoardLayout::default();
        let state = CardState::active(TaskStatus::NotStarted);
        assert!(matches!(
            plan_transition(&layout, state, &gesture("backlog", None)),
            Err(WorkflowError::UnknownColumn(_))
        ));
        assert!(matches!(
            plan_transition(&layout, state, &gesture("not_started", to("backlog", 0))),
            Err(WorkflowError::UnknownColumn(_))
        ));
    }
}
