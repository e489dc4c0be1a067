//! Permission audit logging
//! Records every gate decision as one JSON line in
//! `<dir>/permissions-{date}.log`. Write failures are logged and never
//! affect the gate.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::broker::RequestToken;

/// The decision reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Action declared no privilege requirement
    Unprivileged,
    /// Broker already reported a grant
    ImmediateGrant,
    /// Authorization request issued to the broker
    Requested,
    Granted,
    Denied,
    BrokerUnavailable,
    /// Too many requests already awaiting a decision
    PendingLimitReached,
    /// Decision arrived for a token with no pending request
    StaleCallback,
    /// Pending request dropped at teardown
    Abandoned,
    Completed,
    ActionFailed,
}

/// Record of a single gate decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateAuditEvent {
    pub timestamp: DateTime<Local>,
    pub decision: GateDecision,
    pub action: Option<String>,
    pub token: Option<RequestToken>,
    pub detail: Option<String>,
}

impl GateAuditEvent {
    pub fn new(decision: GateDecision) -> Self {
        Self {
            timestamp: Local::now(),
            decision,
            action: None,
            token: None,
            detail: None,
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn token(mut self, token: RequestToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Audit log for gate decisions
pub struct PermissionAuditLog {
    log_path: PathBuf,
    writer: BufWriter<std::fs::File>,
    event_count: usize,
}

impl PermissionAuditLog {
    /// Create or open the audit log for today
    pub fn new(audit_dir: impl AsRef<Path>) -> Result<Self> {
        let audit_dir = audit_dir.as_ref();
        std::fs::create_dir_all(audit_dir).context("Failed to create audit directory")?;

        let date = Local::now().format("%Y-%m-%d");
        let log_path = audit_dir.join(format!("permissions-{date}.log"));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open audit log at {}", log_path.display()))?;

        info!(log_path = %log_path.display(), "audit log initialized");

        Ok(Self {
            log_path,
            writer: BufWriter::new(file),
            event_count: 0,
        })
    }

    pub fn record(&mut self, event: &GateAuditEvent) -> Result<()> {
        let json = serde_json::to_string(event).context("Failed to serialize gate event")?;
        writeln!(self.writer, "{json}").context("Failed to write to audit log")?;
        self.writer.flush().context("Failed to flush audit log")?;
        self.event_count += 1;
        Ok(())
    }

    /// Number of events logged this session
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

/// Thread-safe front end shared by the gate and the hosting surface.
pub struct AuditTrail {
    log: Mutex<PermissionAuditLog>,
    log_stale_callbacks: bool,
}

impl AuditTrail {
    pub fn new(log: PermissionAuditLog) -> Self {
        Self {
            log: Mutex::new(log),
            log_stale_callbacks: true,
        }
    }

    pub fn open(audit_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(PermissionAuditLog::new(audit_dir)?))
    }

    pub fn with_stale_callbacks(mut self, enabled: bool) -> Self {
        self.log_stale_callbacks = enabled;
        self
    }

    pub fn record(&self, event: GateAuditEvent) {
        if event.decision == GateDecision::StaleCallback && !self.log_stale_callbacks {
            return;
        }
        if let Err(err) = self.log.lock().record(&event) {
            warn!(error = %err, decision = ?event.decision, "failed to record audit event");
        }
    }

    pub fn event_count(&self) -> usize {
        self.log.lock().event_count()
    }

    pub fn log_path(&self) -> PathBuf {
        self.log.lock().log_path().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn audit_log_creates_dated_file() -> Result<()> {
        let dir = TempDir::new()?;
        let log = PermissionAuditLog::new(dir.path().join("audit"))?;
        let name = log
            .log_path()
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        assert!(name.starts_with("permissions-"));
        assert!(name.ends_with(".log"));
        Ok(())
    }

    #[test]
    fn events_are_written_as_json_lines() -> Result<()> {
        let dir = TempDir::new()?;
        let trail = AuditTrail::open(dir.path())?;
        let token = RequestToken::from_raw(7);

        trail.record(
            GateAuditEvent::new(GateDecision::Requested)
                .action("DAT directory")
                .token(token),
        );
        trail.record(GateAuditEvent::new(GateDecision::Denied).token(token));
        assert_eq!(trail.event_count(), 2);

        let content = std::fs::read_to_string(trail.log_path())?;
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(serde_json::from_str)
            .collect::<std::result::Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["decision"], "requested");
        assert_eq!(lines[0]["token"], 7);
        assert_eq!(lines[1]["decision"], "denied");
        Ok(())
    }

    #[test]
    fn stale_callbacks_can_be_silenced() -> Result<()> {
        let dir = TempDir::new()?;
        let trail = AuditTrail::open(dir.path())?.with_stale_callbacks(false);
        trail.record(GateAuditEvent::new(GateDecision::StaleCallback));
        assert_eq!(trail.event_count(), 0);
        Ok(())
    }
}
