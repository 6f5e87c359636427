//! Time-based triggers and the blocking watch loop.
//!
//! The registry only records which handler should run and how often.
//! [`watch`] is what actually runs it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{Result, TrackError};

/// A registered periodic trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub handler: String,
    pub every_minutes: u64,
    pub installed_at: DateTime<Utc>,
}

/// Triggers persisted as a JSON array.
#[derive(Debug)]
pub struct TriggerRegistry {
    path: PathBuf,
    triggers: Vec<Trigger>,
}

impl TriggerRegistry {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let triggers = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| TrackError::json(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(TrackError::io(&path, e)),
        };
        Ok(Self { path, triggers })
    }

    /// Replace every trigger for `handler` with a single new one.
    pub fn install(&mut self, handler: &str, every_minutes: u64) -> Result<&Trigger> {
        if every_minutes == 0 {
            return Err(TrackError::Config(
                "trigger interval must be at least one minute".into(),
            ));
        }
        let removed = self.remove_all(handler);
        self.triggers.push(Trigger {
            handler: handler.to_string(),
            every_minutes,
            installed_at: Utc::now(),
        });
        self.save()?;
        info!(handler, every_minutes, replaced = removed, "Installed trigger");
        let index = self.triggers.len() - 1;
        Ok(&self.triggers[index])
    }

    /// Remove every trigger for `handler`. Returns how many were removed.
    pub fn remove(&mut self, handler: &str) -> Result<usize> {
        let removed = self.remove_all(handler);
        if removed > 0 {
            self.save()?;
            info!(handler, removed, "Removed trigger");
        }
        Ok(removed)
    }

    pub fn list(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Interval of the trigger registered for `handler`, if any.
    pub fn interval_for(&self, handler: &str) -> Option<Duration> {
        self.triggers
            .iter()
            .find(|t| t.handler == handler)
            .map(|t| Duration::from_secs(t.every_minutes * 60))
    }

    fn remove_all(&mut self, handler: &str) -> usize {
        let before = self.triggers.len();
        self.triggers.retain(|t| t.handler != handler);
        before - self.triggers.len()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TrackError::io(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.triggers)
            .map_err(|e| TrackError::json(&self.path, e))?;
        std::fs::write(&self.path, json).map_err(|e| TrackError::io(&self.path, e))
    }
}

/// Whether the watch loop should keep going after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Run `job` now and then once per `interval`, one pass at a time.
///
/// A failing pass is logged and the loop keeps going. The loop ends when the
/// job returns [`Flow::Stop`].
pub fn watch<F>(interval: Duration, mut job: F)
where
    F: FnMut(u64) -> Result<Flow>,
{
    let mut pass: u64 = 0;
    loop {
        pass += 1;
        match job(pass) {
            Ok(Flow::Stop) => break,
            Ok(Flow::Continue) => {}
            Err(e) => error!(pass, error = %e, "Scheduled run failed"),
        }
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triggers.json");
        let mut registry = TriggerRegistry::open(&path).unwrap();
        registry.install("advancedGmailFilter", 30).unwrap();
        registry.install("advancedGmailFilter", 15).unwrap();
        registry.install("other", 60).unwrap();
        assert_eq!(registry.list().len(), 2);
        assert_eq!(
            registry.interval_for("advancedGmailFilter"),
            Some(Duration::from_secs(15 * 60))
        );

        let reopened = TriggerRegistry::open(&path).unwrap();
        assert_eq!(reopened.list(), registry.list());
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = TriggerRegistry::open(dir.path().join("t.json")).unwrap();
        registry.install("h", 30).unwrap();
        assert_eq!(registry.remove("h").unwrap(), 1);
        assert_eq!(registry.remove("h").unwrap(), 0);
        assert!(registry.list().is_empty());
        assert_eq!(registry.interval_for("h"), None);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = TriggerRegistry::open(dir.path().join("t.json")).unwrap();
        assert!(matches!(registry.install("h", 0), Err(TrackError::Config(_))));
    }

    #[test]
    fn test_watch_runs_until_stop_and_survives_errors() {
        let mut passes = Vec::new();
        watch(Duration::from_millis(1), |pass| {
            passes.push(pass);
            match pass {
                1 => Err(TrackError::Sheet("boom".into())),
                2 => Ok(Flow::Continue),
                _ => Ok(Flow::Stop),
            }
        });
        assert_eq!(passes, vec![1, 2, 3]);
    }
}
