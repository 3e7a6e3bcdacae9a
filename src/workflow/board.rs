//! Optimistic local board state
//!
//! Card moves are applied here before their store write resolves. Every local
//! change bumps the card's revision, so a failed write only reverts the card
//! when nothing newer happened to it in the meantime; otherwise the card is
//! flagged stale until the next server row replaces it.

use super::columns::BoardLayout;
use super::error::WorkflowError;
use super::models::{CardState, Task, TaskId};
use super::transition::{plan_transition, DragGesture, Transition};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardCard {
    pub task: Task,
    pub revision: u64,
    /// Local state may disagree with the store
    pub stale: bool,
}

/// A move applied locally whose write has not resolved yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMove {
    pub task_id: TaskId,
    pub previous: CardState,
    pub transition: Transition,
    /// Card revision right after the optimistic apply
    pub revision: u64,
}

/// What happened to the local card after its write failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackOutcome {
    Reverted,
    FlaggedStale,
    /// The card left the board before the write resolved
    Missing,
}

pub struct TaskBoard {
    layout: BoardLayout,
    cards: RwLock<HashMap<TaskId, BoardCard>>,
}

impl TaskBoard {
    pub fn new(layout: BoardLayout) -> Self {
        Self {
            layout,
            cards: RwLock::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    /// Replace every card with fresh rows
    pub async fn load(&self, tasks: impl IntoIterator<Item = Task>) {
        let mut cards = self.cards.write().await;
        cards.clear();
        for task in tasks {
            cards.insert(
                task.id,
                BoardCard {
                    task,
                    revision: 0,
                    stale: false,
                },
            );
        }
    }

    /// Take a row as the store's truth for that card
    pub async fn upsert(&self, task: Task) {
        let mut cards = self.cards.write().await;
        match cards.get_mut(&task.id) {
            Some(card) => {
                card.task = task;
                card.revision += 1;
                card.stale = false;
            }
            None => {
                cards.insert(
                    task.id,
                    BoardCard {
                        task,
                        revision: 0,
                        stale: false,
                    },
                );
            }
        }
    }

    pub async fn remove(&self, task_id: TaskId) -> Option<Task> {
        self.cards.write().await.remove(&task_id).map(|c| c.task)
    }

    pub async fn card(&self, task_id: TaskId) -> Option<BoardCard> {
        self.cards.read().await.get(&task_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.cards.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cards.read().await.is_empty()
    }

    /// Tasks shown in `column_id`, oldest first
    pub async fn column_cards(&self, column_id: &str) -> Result<Vec<Task>, WorkflowError> {
        let column = self.layout.require(column_id)?;
        let cards = self.cards.read().await;
        let mut tasks: Vec<Task> = cards
            .values()
            .filter(|card| {
                self.layout
                    .column_for(card.task.card_state())
                    .is_some_and(|c| c.id == column.id)
            })
            .map(|card| card.task.clone())
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    pub async fn stale_cards(&self) -> Vec<TaskId> {
        self.cards
            .read()
            .await
            .values()
            .filter(|card| card.stale)
            .map(|card| card.task.id)
            .collect()
    }

    /// Plan `gesture` against the card's current state and apply the result
    /// locally, in one step under the board lock.
    pub async fn begin(&self, gesture: &DragGesture) -> Result<PendingMove, WorkflowError> {
        let mut cards = self.cards.write().await;
        let card = cards
            .get_mut(&gesture.task_id)
            .ok_or(WorkflowError::TaskNotFound(gesture.task_id))?;

        let previous = card.task.card_state();
        let transition = plan_transition(&self.layout, previous, gesture)?;
        if !transition.is_noop() {
            card.task.set_card_state(transition.to);
            card.revision += 1;
            debug!(task_id = %gesture.task_id, to = ?transition.to, "Card moved locally");
        }

        Ok(PendingMove {
            task_id: gesture.task_id,
            previous,
            transition,
            revision: card.revision,
        })
    }

    /// The write for `pending` succeeded with `task` as the stored row.
    /// Ignored when the card changed locally since.
    pub async fn confirm(&self, pending: &PendingMove, task: Task) {
        let mut cards = self.cards.write().await;
        if let Some(card) = cards.get_mut(&pending.task_id) {
            if card.revision == pending.revision {
                card.task = task;
                card.stale = false;
            }
        }
    }

    /// The write for `pending` failed
    pub async fn rollback(&self, pending: &PendingMove) -> RollbackOutcome {
        let mut cards = self.cards.write().await;
        let Some(card) = cards.get_mut(&pending.task_id) else {
            return RollbackOutcome::Missing;
        };

        if card.revision == pending.revision {
            card.task.set_card_state(pending.previous);
            card.revision += 1;
            card.stale = false;
            RollbackOutcome::Reverted
        } else {
            card.stale = true;
            RollbackOutcome::FlaggedStale
        }
    }
}
