//! Task workflow flows against the in-memory session

use chrono::NaiveDate;
use std::time::Duration;
use taskboard_sync::store::TaskStore;
use taskboard_sync::sync::{log_channel_errors, presets};
use taskboard_sync::workflow::{
    CreateTaskRequest, DeleteStep, DragGesture, DropPosition, GanttSpec, Project, SideEffect,
    Subtask, TaskStatus, TaskUpdate, WorkflowError,
};
use taskboard_sync::{Config, DashboardState};
use tokio::time::sleep;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
}

async fn setup() -> (DashboardState, Project) {
    let state = DashboardState::in_memory(Config::default(), log_channel_errors());
    let project = Project::new("Workflow");
    state.store.create_project(&project).await.unwrap();
    state.open_board(project.id).await.unwrap();
    (state, project)
}

#[tokio::test(start_paused = true)]
async fn test_drag_across_columns_updates_store_and_invalidates_board() {
    let (state, project) = setup().await;
    let task = state
        .workflow
        .create_task(CreateTaskRequest::new(project.id, "Drag me"))
        .await
        .unwrap();
    sleep(Duration::from_millis(200)).await;
    let mut signals = state.cache.subscribe();

    let transition = state
        .workflow
        .move_card(&DragGesture::to_column(
            task.id,
            DropPosition::new("not_started", 0),
            DropPosition::new("in_progress", 1),
        ))
        .await
        .unwrap();
    assert_eq!(
        transition.effect,
        SideEffect::UpdateStatus {
            status: TaskStatus::InProgress
        }
    );

    let stored = state.store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::InProgress);
    assert!(!stored.is_archived);

    sleep(Duration::from_millis(200)).await;
    let signal = signals.try_recv().unwrap();
    assert_eq!(signal.key, presets::board_key(project.id));
}

#[tokio::test(start_paused = true)]
async fn test_same_spot_drop_writes_nothing() {
    let (state, project) = setup().await;
    let task = state
        .workflow
        .create_task(CreateTaskRequest::new(project.id, "Stay"))
        .await
        .unwrap();
    sleep(Duration::from_millis(200)).await;
    let mut signals = state.cache.subscribe();

    let transition = state
        .workflow
        .move_card(&DragGesture::to_column(
            task.id,
            DropPosition::new("not_started", 0),
            DropPosition::new("not_started", 0),
        ))
        .await
        .unwrap();
    assert!(transition.is_noop());

    sleep(Duration::from_millis(200)).await;
    assert!(signals.try_recv().is_err(), "no write means no change event");
    let stored = state.store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.updated_at, None);
}

#[tokio::test]
async fn test_archive_zone_then_back_to_column() {
    let (state, project) = setup().await;
    let task = state
        .workflow
        .create_task(CreateTaskRequest::new(project.id, "Shelve").with_status(TaskStatus::Pending))
        .await
        .unwrap();

    state
        .workflow
        .move_card(&DragGesture::to_archive_zone(
            task.id,
            DropPosition::new("pending", 0),
        ))
        .await
        .unwrap();
    let stored = state.store.get_task(task.id).await.unwrap().unwrap();
    assert!(stored.is_archived);
    assert_eq!(stored.status, TaskStatus::Pending);

    let board = state.workflow.board();
    assert_eq!(board.column_cards("archived").await.unwrap().len(), 1);
    assert!(board.column_cards("pending").await.unwrap().is_empty());

    state.workflow.unarchive(task.id, "completed").await.unwrap();
    let stored = state.store.get_task(task.id).await.unwrap().unwrap();
    assert!(!stored.is_archived);
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(board.column_cards("completed").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cascade_delete_of_gantt_task() {
    let (state, project) = setup().await;
    let task = state
        .workflow
        .create_task(
            CreateTaskRequest::new(project.id, "Owner").with_gantt(GanttSpec {
                start_date: Some(date(1)),
                duration_days: Some(4),
                dependencies: vec![],
            }),
        )
        .await
        .unwrap();
    for i in 0..2 {
        state
            .store
            .create_subtask(&Subtask::new(task.id, format!("subtask {i}")))
            .await
            .unwrap();
    }
    for i in 0..3 {
        state
            .store
            .create_task_update(&TaskUpdate::new(task.id, format!("update {i}")))
            .await
            .unwrap();
    }

    let steps = state.workflow.delete_task(task.id).await.unwrap();
    assert_eq!(steps, DeleteStep::ORDER.to_vec());

    assert!(state.store.list_subtasks(task.id).await.unwrap().is_empty());
    assert!(state.store.list_task_updates(task.id).await.unwrap().is_empty());
    assert!(state.store.get_gantt_data(task.id).await.unwrap().is_none());
    assert!(state.store.get_task(task.id).await.unwrap().is_none());
    assert!(state.workflow.board().card(task.id).await.is_none());

    let again = state.workflow.delete_task(task.id).await;
    assert!(matches!(again, Err(WorkflowError::TaskNotFound(_))));
}

#[tokio::test]
async fn test_dependency_chain_schedule() {
    let (state, project) = setup().await;
    let gantt = |start: Option<NaiveDate>, deps: Vec<_>| GanttSpec {
        start_date: start,
        duration_days: Some(3),
        dependencies: deps,
    };

    let a = state
        .workflow
        .create_task(
            CreateTaskRequest::new(project.id, "A").with_gantt(gantt(Some(date(1)), vec![])),
        )
        .await
        .unwrap();
    let b = state
        .workflow
        .create_task(CreateTaskRequest::new(project.id, "B").with_gantt(gantt(None, vec![a.id])))
        .await
        .unwrap();
    let c = state
        .workflow
        .create_task(CreateTaskRequest::new(project.id, "C").with_gantt(gantt(None, vec![b.id])))
        .await
        .unwrap();

    let schedule = state.workflow.project_schedule(project.id).await.unwrap();
    assert_eq!(schedule.entry(b.id).unwrap().start_date, Some(date(4)));
    assert_eq!(schedule.entry(c.id).unwrap().start_date, Some(date(7)));
    assert!(schedule.entry(c.id).unwrap().derived);
    assert!(schedule.cycles.is_empty());

    let cycle = state
        .workflow
        .update_gantt(a.id, &gantt(None, vec![c.id]))
        .await;
    assert!(matches!(cycle, Err(WorkflowError::DependencyCycle { .. })));
}
