//! Per-session context shared by every dispatch call
//!
//! One `SessionState` is created per shell or TUI session and passed by
//! `&mut` into the dispatcher; nothing else owns it.

use std::time::{Duration, Instant};

use planstore::{Project, StoreError};
use tracing::debug;

use crate::services::Repository;

/// Default lifetime of the cached project list
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(5000);

/// The work item the user said they are working on
#[derive(Debug, Clone)]
pub struct ActiveWork {
    pub id: String,
    pub title: String,
    pub started_at: Instant,
}

impl ActiveWork {
    /// Whole minutes since `start`, at least 1
    pub fn elapsed_min(&self) -> u32 {
        let minutes = self.started_at.elapsed().as_secs() / 60;
        u32::try_from(minutes).unwrap_or(u32::MAX).max(1)
    }
}

#[derive(Debug)]
struct ProjectCache {
    projects: Vec<Project>,
    fetched_at: Instant,
}

/// Mutable context of one interactive session
#[derive(Debug)]
pub struct SessionState {
    /// Empty when no project is active
    pub active_project_id: String,
    pub active_project_code: String,
    pub active_work: Option<ActiveWork>,
    pub last_logged_min: Option<u32>,
    cache: Option<ProjectCache>,
    cache_ttl: Duration,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl SessionState {
    pub fn new(cache_ttl: Duration) -> Self {
        debug!(?cache_ttl, "SessionState::new: called");
        Self {
            active_project_id: String::new(),
            active_project_code: String::new(),
            active_work: None,
            last_logged_min: None,
            cache: None,
            cache_ttl,
        }
    }

    pub fn has_active_project(&self) -> bool {
        !self.active_project_id.is_empty()
    }

    /// Active project id, if any
    pub fn active_project(&self) -> Option<&str> {
        self.has_active_project().then_some(self.active_project_id.as_str())
    }

    /// Active project short code, if any
    pub fn active_code(&self) -> Option<&str> {
        self.has_active_project().then_some(self.active_project_code.as_str())
    }

    pub fn set_active_project(&mut self, project: &Project) {
        debug!(id = %project.id, code = %project.short_code, "SessionState::set_active_project: called");
        self.active_project_id = project.id.clone();
        self.active_project_code = project.short_code.clone();
    }

    pub fn clear_active_project(&mut self) {
        debug!("SessionState::clear_active_project: called");
        self.active_project_id.clear();
        self.active_project_code.clear();
    }

    pub fn start_work(&mut self, id: &str, title: &str) {
        debug!(%id, "SessionState::start_work: called");
        self.active_work = Some(ActiveWork {
            id: id.to_string(),
            title: title.to_string(),
            started_at: Instant::now(),
        });
    }

    /// Clear the active work item, returning it
    pub fn finish_work(&mut self) -> Option<ActiveWork> {
        debug!("SessionState::finish_work: called");
        self.active_work.take()
    }

    pub fn record_logged(&mut self, minutes: u32) {
        self.last_logged_min = Some(minutes);
    }

    /// Non-archived projects, served from the cache while it is fresh
    pub fn projects(&mut self, repo: &dyn Repository) -> Result<Vec<Project>, StoreError> {
        if let Some(cache) = &self.cache
            && cache.fetched_at.elapsed() < self.cache_ttl
        {
            debug!("SessionState::projects: cache hit");
            return Ok(cache.projects.clone());
        }
        debug!("SessionState::projects: cache miss");
        let projects = repo.list_projects(false)?;
        self.cache = Some(ProjectCache {
            projects: projects.clone(),
            fetched_at: Instant::now(),
        });
        Ok(projects)
    }

    /// Drop the cached project list; the next read refetches
    pub fn invalidate_cache(&mut self) {
        debug!("SessionState::invalidate_cache: called");
        self.cache = None;
    }

    /// Back to a fresh session, keeping the configured TTL
    pub fn reset(&mut self) {
        debug!("SessionState::reset: called");
        *self = Self::new(self.cache_ttl);
    }

    /// Multi-line description for the `context` built-in
    pub fn describe(&self) -> String {
        let project = match self.active_code() {
            Some(code) => format!("{} ({})", code, self.active_project_id),
            None => "none".to_string(),
        };
        let work = match &self.active_work {
            Some(w) => format!("{} ({} min so far)", w.title, w.started_at.elapsed().as_secs() / 60),
            None => "none".to_string(),
        };
        let last = self
            .last_logged_min
            .map(|m| format!("{} min", m))
            .unwrap_or_else(|| "none".to_string());
        format!(
            "Active project: {}\nActive work item: {}\nLast logged: {}",
            project, work, last
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{add_project, temp_services};

    #[test]
    fn test_new_session_is_empty() {
        let state = SessionState::default();
        assert!(!state.has_active_project());
        assert_eq!(state.active_project(), None);
        assert!(state.active_work.is_none());
        assert!(state.describe().contains("Active project: none"));
    }

    #[test]
    fn test_set_and_reset_active_project() {
        let (_dir, services) = temp_services();
        let project = add_project(&services, "Physics Study Plan");

        let mut state = SessionState::default();
        state.set_active_project(&project);
        state.start_work("w1", "Read chapter");
        state.record_logged(25);
        assert_eq!(state.active_code(), Some("PSP"));

        state.reset();
        assert_eq!(state.active_code(), None);
        assert!(state.active_work.is_none());
        assert_eq!(state.last_logged_min, None);
    }

    #[test]
    fn test_project_cache_respects_ttl() {
        let (_dir, services) = temp_services();
        add_project(&services, "First");

        let mut state = SessionState::new(Duration::from_secs(60));
        assert_eq!(state.projects(services.repo.as_ref()).unwrap().len(), 1);

        add_project(&services, "Second");
        // Still fresh: served from cache
        assert_eq!(state.projects(services.repo.as_ref()).unwrap().len(), 1);

        state.invalidate_cache();
        assert_eq!(state.projects(services.repo.as_ref()).unwrap().len(), 2);
    }

    #[test]
    fn test_zero_ttl_always_refetches() {
        let (_dir, services) = temp_services();
        let mut state = SessionState::new(Duration::ZERO);
        assert!(state.projects(services.repo.as_ref()).unwrap().is_empty());
        add_project(&services, "Later");
        assert_eq!(state.projects(services.repo.as_ref()).unwrap().len(), 1);
    }

    #[test]
    fn test_finish_work_takes_item() {
        let mut state = SessionState::default();
        state.start_work("abc", "Essay");
        let work = state.finish_work().unwrap();
        assert_eq!(work.id, "abc");
        assert_eq!(work.elapsed_min(), 1);
        assert!(state.finish_work().is_none());
    }
}
