//! Taskboard Sync
//!
//! Live-data synchronization and task workflow for a project dashboard:
//! - Change-feed subscriptions turned into debounced cache invalidations
//! - Drag-and-drop task workflow with archive semantics and cascading deletes
//! - Dependency-derived scheduling for Gantt tasks

pub mod cache;
pub mod events;
pub mod store;
pub mod sync;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::Result;
use cache::{CacheKey, MokaQueryCache};
use events::LocalChangeFeed;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use store::{MemoryTaskStore, TaskStore};
use sync::{presets, ChannelErrorHandler, ReconcileReport, SyncSession};
use workflow::{
    BoardLayout, Column, ProjectId, TaskBoard, TaskId, TaskStatus, TaskWorkflow, WorkflowError,
};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub sync: SyncYamlConfig,
    pub cache: CacheYamlConfig,
    pub board: BoardYamlConfig,
}

/// Debounce windows
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncYamlConfig {
    pub debounce_ms: u64,
    pub dashboard_debounce_ms: u64,
}

impl Default for SyncYamlConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            dashboard_debounce_ms: 300,
        }
    }
}

/// Query cache sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheYamlConfig {
    pub max_capacity: u64,
    pub ttl_secs: Option<u64>,
    pub signal_capacity: usize,
}

impl Default for CacheYamlConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl_secs: None,
            signal_capacity: 1024,
        }
    }
}

/// Board section. Without `columns` the built-in layout is used.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BoardYamlConfig {
    pub columns: Option<Vec<ColumnConfig>>,
}

/// One board column: either shows a `status`, or is the archive column
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnConfig {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub archive: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("column '{0}' must name exactly one of `status` or `archive: true`")]
    AmbiguousColumn(String),

    #[error(transparent)]
    Layout(#[from] WorkflowError),
}

impl BoardYamlConfig {
    /// Build and validate the configured layout
    pub fn layout(&self) -> Result<BoardLayout, ConfigError> {
        let Some(columns) = &self.columns else {
            return Ok(BoardLayout::default());
        };

        let columns = columns
            .iter()
            .map(|c| match (c.status, c.archive) {
                (Some(status), false) => Ok(Column::status(c.id.clone(), c.title.clone(), status)),
                (None, true) => Ok(Column::archive(c.id.clone(), c.title.clone())),
                _ => Err(ConfigError::AmbiguousColumn(c.id.clone())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BoardLayout::new(columns)?)
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Default debounce window D
    pub debounce: Duration,
    /// Window of the dashboard-wide aggregate bindings
    pub dashboard_debounce: Duration,
    pub cache_capacity: u64,
    pub cache_ttl: Option<Duration>,
    pub signal_capacity: usize,
    pub layout: BoardLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce: sync::DEFAULT_DEBOUNCE,
            dashboard_debounce: sync::DASHBOARD_DEBOUNCE,
            cache_capacity: 10_000,
            cache_ttl: None,
            signal_capacity: 1024,
            layout: BoardLayout::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. A missing or
    /// unparseable file falls back to defaults; an invalid board layout is
    /// an error.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let debounce_ms = env_parse("TASKBOARD_DEBOUNCE_MS").unwrap_or(yaml.sync.debounce_ms);
        let dashboard_ms = env_parse("TASKBOARD_DASHBOARD_DEBOUNCE_MS")
            .unwrap_or(yaml.sync.dashboard_debounce_ms);
        let ttl_secs = env_parse("TASKBOARD_CACHE_TTL_SECS").or(yaml.cache.ttl_secs);

        Ok(Self {
            debounce: Duration::from_millis(debounce_ms),
            dashboard_debounce: Duration::from_millis(dashboard_ms),
            cache_capacity: env_parse("TASKBOARD_CACHE_CAPACITY")
                .unwrap_or(yaml.cache.max_capacity),
            cache_ttl: ttl_secs.map(Duration::from_secs),
            signal_capacity: yaml.cache.signal_capacity,
            layout: yaml.board.layout()?,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!("No config file at {}, using env vars / defaults", path.display());
                YamlConfig::default()
            }
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

// ============================================================================
// Session state
// ============================================================================

/// Everything one signed-in session owns, wired explicitly.
///
/// Cloning shares the same session.
#[derive(Clone)]
pub struct DashboardState {
    pub feed: LocalChangeFeed,
    pub cache: Arc<MokaQueryCache>,
    pub store: Arc<dyn TaskStore>,
    pub session: Arc<SyncSession>,
    pub workflow: Arc<TaskWorkflow>,
    pub config: Arc<Config>,
}

impl DashboardState {
    /// Session backed by the in-process feed, cache and store
    pub fn in_memory(config: Config, on_error: ChannelErrorHandler) -> Self {
        let feed = LocalChangeFeed::new();
        let cache = Arc::new(MokaQueryCache::with_options(
            config.cache_capacity,
            config.cache_ttl,
            config.signal_capacity,
        ));
        let store: Arc<dyn TaskStore> =
            Arc::new(MemoryTaskStore::with_emitter(Arc::new(feed.clone())));
        let session = Arc::new(SyncSession::new(
            Arc::new(feed.clone()),
            cache.clone(),
            config.debounce,
            on_error,
        ));
        let board = Arc::new(TaskBoard::new(config.layout.clone()));
        let workflow = Arc::new(TaskWorkflow::new(store.clone(), board));

        Self {
            feed,
            cache,
            store,
            session,
            workflow,
            config: Arc::new(config),
        }
    }

    /// Subscribe a project's board and load its cards
    pub async fn open_board(
        &self,
        project_id: ProjectId,
    ) -> Result<ReconcileReport, WorkflowError> {
        let report = self
            .session
            .subscribe_all(presets::board_bindings(project_id))
            .await;
        self.workflow.load_project(project_id).await?;
        Ok(report)
    }

    pub async fn open_gantt(&self, project_id: ProjectId) -> ReconcileReport {
        self.session
            .subscribe_all(presets::gantt_bindings(project_id))
            .await
    }

    pub async fn open_task_detail(&self, task_id: TaskId) -> ReconcileReport {
        self.session
            .subscribe_all(presets::task_detail_bindings(task_id))
            .await
    }

    pub async fn open_dashboard(&self) -> ReconcileReport {
        self.session
            .subscribe_all(presets::dashboard_bindings(self.config.dashboard_debounce))
            .await
    }

    /// Unmount the view behind `cache_key`
    pub async fn close_view(&self, cache_key: &CacheKey) -> usize {
        self.session.unsubscribe_key(cache_key).await
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod state_tests {
    use super::*;
    use crate::test_helpers::ErrorSink;
    use crate::workflow::{CreateTaskRequest, Project};

    #[tokio::test]
    async fn test_open_board_subscribes_and_loads() {
        let errors = ErrorSink::default();
        let state = DashboardState::in_memory(Config::default(), errors.handler());
        let project = Project::new("Wiring");
        state.store.create_project(&project).await.unwrap();
        state
            .store
            .create_task(&workflow::Task::new(project.id, "Existing"))
            .await
            .unwrap();

        let report = state.open_board(project.id).await.unwrap();
        assert_eq!(report.opened, 1);
        assert_eq!(state.workflow.board().len().await, 1);
        assert_eq!(state.feed.open_channel_count(), 1);

        state
            .workflow
            .create_task(CreateTaskRequest::new(project.id, "New"))
            .await
            .unwrap();
        assert_eq!(state.workflow.board().len().await, 2);

        state.logout().await;
        assert_eq!(state.feed.open_channel_count(), 0);
        assert!(errors.take().is_empty());
    }

    #[tokio::test]
    async fn test_close_view_leaves_other_views() {
        let state = DashboardState::in_memory(Config::default(), sync::log_channel_errors());
        let project_id = uuid::Uuid::new_v4();
        state.open_gantt(project_id).await;
        state.open_dashboard().await;
        assert_eq!(state.feed.open_channel_count(), 6);

        let closed = state.close_view(&presets::gantt_key(project_id)).await;
        assert_eq!(closed, 2);
        assert_eq!(state.feed.open_channel_count(), 4);
    }
}
