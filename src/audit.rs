use crate::config::{ConfigError, RequestLogLevel};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Audit sink for full request bodies: dead-lettered requests and, at the
/// `All` level, successful ones too. One file per request, named by a fresh
/// UUID. Writes are fire-and-forget; a failed write is logged and never
/// propagated back into the dispatch path.
pub struct RequestLog {
    deadletter_location: Option<PathBuf>,
    success_location: Option<PathBuf>,
}

impl RequestLog {
    pub fn new(
        location: Option<&Path>,
        level: RequestLogLevel,
    ) -> Result<Self, ConfigError> {
        if level != RequestLogLevel::None && location.is_none() {
            return Err(ConfigError::InvalidConfig(
                "request log location can't be empty when the log level is not none".into(),
            ));
        }

        let deadletter_location = match (level, location) {
            (RequestLogLevel::None, _) => None,
            (_, Some(base)) => Some(create_subdir(base, "deadletter")?),
            (_, None) => None,
        };
        let success_location = match (level, location) {
            (RequestLogLevel::All, Some(base)) => Some(create_subdir(base, "successful")?),
            _ => None,
        };

        Ok(Self {
            deadletter_location,
            success_location,
        })
    }

    /// A disabled sink, for pushers configured without request logging.
    pub fn disabled() -> Self {
        Self {
            deadletter_location: None,
            success_location: None,
        }
    }

    pub fn log_success(&self, body: &str) {
        if let Some(dir) = &self.success_location {
            write_detached(dir.join(Uuid::new_v4().to_string()), body.to_string());
        }
    }

    pub fn log_failure(&self, body: &str) {
        if let Some(dir) = &self.deadletter_location {
            write_detached(dir.join(Uuid::new_v4().to_string()), body.to_string());
        }
    }

    pub fn success_enabled(&self) -> bool {
        self.success_location.is_some()
    }

    pub fn deadletter_enabled(&self) -> bool {
        self.deadletter_location.is_some()
    }
}

fn create_subdir(base: &Path, name: &str) -> Result<PathBuf, ConfigError> {
    let dir = base.join(name);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn write_detached(path: PathBuf, body: String) {
    tokio::spawn(async move {
        if let Err(e) = tokio::fs::write(&path, body).await {
            warn!(path = %path.display(), error = %e, "failed to write request log entry");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn settle() {
        // Writes are detached; give them a moment to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn deadletter_level_only_writes_failures() {
        let dir = tempfile::tempdir().unwrap();
        let log = RequestLog::new(Some(dir.path()), RequestLogLevel::DeadletterOnly).unwrap();
        assert!(log.deadletter_enabled());
        assert!(!log.success_enabled());

        log.log_failure("bad batch");
        log.log_success("good batch");
        settle().await;

        let deadletter: Vec<_> = std::fs::read_dir(dir.path().join("deadletter"))
            .unwrap()
            .collect();
        assert_eq!(deadletter.len(), 1);
        assert!(!dir.path().join("successful").exists());
    }

    #[tokio::test]
    async fn all_level_writes_both_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let log = RequestLog::new(Some(dir.path()), RequestLogLevel::All).unwrap();

        log.log_failure("bad");
        log.log_success("good");
        settle().await;

        assert_eq!(
            std::fs::read_dir(dir.path().join("deadletter")).unwrap().count(),
            1
        );
        assert_eq!(
            std::fs::read_dir(dir.path().join("successful")).unwrap().count(),
            1
        );
    }

    #[test]
    fn none_level_is_fully_disabled() {
        let log = RequestLog::new(None, RequestLogLevel::None).unwrap();
        assert!(!log.deadletter_enabled());
        assert!(!log.success_enabled());
    }

    #[test]
    fn enabled_level_without_location_is_rejected() {
        assert!(RequestLog::new(None, RequestLogLevel::All).is_err());
    }
}
