use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::board::columns::WipLimits;
use crate::board::controller::Settings;
use crate::board::notice::NoticeDuration;
use crate::board::{Project, ProjectId, Status, TeamSummary, UserSummary};

/// `.tasklane/config.toml`: shared store metadata and the user/team directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub store: StoreSection,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub users: Vec<UserSummary>,
    #[serde(default)]
    pub teams: Vec<TeamSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    pub name: String,
    pub next_task_id: u32,
    /// When the store was created (ISO-8601 string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl StoreConfig {
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn next_task_id(&mut self) -> String {
        let n = self.store.next_task_id;
        self.store.next_task_id += 1;
        n.to_string()
    }
}

fn default_delete_grace_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".into()
}

/// `.tasklane/local.toml`: per-user preferences, never committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub notice_duration: NoticeDuration,
    #[serde(default = "default_delete_grace_ms")]
    pub delete_grace_ms: u64,
    #[serde(default)]
    pub rollback_on_failure: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// project id -> status name -> limit. Kept last: TOML tables must
    /// follow plain values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub wip_limits: BTreeMap<ProjectId, BTreeMap<String, u32>>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            notice_duration: NoticeDuration::default(),
            delete_grace_ms: default_delete_grace_ms(),
            rollback_on_failure: false,
            log_level: default_log_level(),
            wip_limits: BTreeMap::new(),
        }
    }
}

impl LocalConfig {
    pub fn settings(&self) -> Settings {
        Settings {
            delete_grace: Duration::from_millis(self.delete_grace_ms),
            rollback_on_failure: self.rollback_on_failure,
            notice_duration: self.notice_duration,
        }
    }

    /// Limits for `project`. Unknown status names are skipped.
    pub fn wip_limits_for(&self, project: &str) -> WipLimits {
        let Some(raw) = self.wip_limits.get(project) else {
            return WipLimits::default();
        };
        raw.iter()
            .filter_map(|(name, limit)| match name.parse::<Status>() {
                Ok(status) => Some((status, *limit)),
                Err(e) => {
                    tracing::warn!(project, %e, "ignoring wip limit");
                    None
                }
            })
            .collect()
    }

    pub fn set_wip_limits(&mut self, project: &str, limits: &WipLimits) {
        let raw: BTreeMap<String, u32> = limits
            .iter()
            .map(|(status, limit)| (status.as_str().to_string(), limit))
            .collect();
        if raw.is_empty() {
            self.wip_limits.remove(project);
        } else {
            self.wip_limits.insert(project.to_string(), raw);
        }
    }
}
