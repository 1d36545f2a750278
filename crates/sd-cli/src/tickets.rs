//! JSONL-file ticket directory and console notifier.
//!
//! The engine consumes tickets through the `TicketDirectory` trait; this
//! file-backed implementation stands in for the external ticket domain. Each
//! line of the file is one `TicketSnapshot` as JSON. Escalation writes
//! (priority raises, reassignments) rewrite the whole file, which is fine at
//! CLI scale.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use sd_core::escalation::BreachKind;
use sd_core::ticket::TicketSnapshot;
use sd_core::types::Priority;
use sd_engine::{DirectoryError, EscalationNotifier, NotifyError, TicketDirectory};

/// Ticket directory backed by a JSONL file.
pub struct FileTicketDirectory {
    path: PathBuf,
    tickets: Vec<TicketSnapshot>,
}

impl FileTicketDirectory {
    /// Loads the ticket file. A missing file is an empty directory.
    pub fn load(path: &Path) -> Result<Self> {
        let tickets = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mut tickets = Vec::new();
            for (number, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let ticket: TicketSnapshot = serde_json::from_str(line).with_context(|| {
                    format!("invalid ticket on line {} of {}", number + 1, path.display())
                })?;
                tickets.push(ticket);
            }
            tickets
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            tickets,
        })
    }

    /// Looks a ticket up by ID.
    #[must_use]
    pub fn find(&self, ticket_id: &str) -> Option<&TicketSnapshot> {
        self.tickets.iter().find(|t| t.id == ticket_id)
    }

    /// All loaded snapshots.
    #[must_use]
    pub fn all(&self) -> &[TicketSnapshot] {
        &self.tickets
    }

    fn persist(&self) -> Result<(), DirectoryError> {
        let mut content = String::new();
        for ticket in &self.tickets {
            let line = serde_json::to_string(ticket)
                .map_err(|err| DirectoryError::Unavailable(err.to_string()))?;
            content.push_str(&line);
            content.push('\n');
        }
        fs::write(&self.path, content)
            .map_err(|err| DirectoryError::Unavailable(err.to_string()))
    }

    fn update<F>(&mut self, ticket_id: &str, apply: F) -> Result<(), DirectoryError>
    where
        F: FnOnce(&mut TicketSnapshot),
    {
        let ticket = self
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| DirectoryError::TicketNotFound {
                ticket_id: ticket_id.to_string(),
            })?;
        apply(ticket);
        self.persist()
    }
}

impl TicketDirectory for FileTicketDirectory {
    fn get(&self, ticket_id: &str) -> Result<Option<TicketSnapshot>, DirectoryError> {
        Ok(self.find(ticket_id).cloned())
    }

    fn set_priority(&mut self, ticket_id: &str, priority: Priority) -> Result<(), DirectoryError> {
        self.update(ticket_id, |ticket| ticket.priority = priority)
    }

    fn reassign(&mut self, ticket_id: &str, agent_id: &str) -> Result<(), DirectoryError> {
        self.update(ticket_id, |ticket| {
            ticket.agent_id = Some(agent_id.to_string());
        })
    }
}

/// Notifier that prints breach notices to the given writer.
///
/// Stands in for the mailer; a production deployment would queue an email
/// task here instead.
pub struct ConsoleNotifier<W: std::io::Write> {
    writer: W,
}

impl<W: std::io::Write> ConsoleNotifier<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: std::io::Write> EscalationNotifier for ConsoleNotifier<W> {
    fn notify_breach(
        &mut self,
        ticket: &TicketSnapshot,
        kind: BreachKind,
        target: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        writeln!(
            self.writer,
            "notice: ticket {} breached its {} deadline (target {})",
            ticket.id,
            kind,
            target.to_rfc3339()
        )
        .map_err(|err| NotifyError {
            ticket_id: ticket.id.clone(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use sd_core::types::TicketStatus;

    fn snapshot(id: &str) -> TicketSnapshot {
        TicketSnapshot {
            id: id.to_string(),
            priority: Priority::High,
            status: TicketStatus::Open,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            customer_id: "C-1".to_string(),
            agent_id: None,
            satisfaction_rating: None,
        }
    }

    fn write_tickets(path: &Path, tickets: &[TicketSnapshot]) {
        let mut content = String::new();
        for ticket in tickets {
            content.push_str(&serde_json::to_string(ticket).unwrap());
            content.push('\n');
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn missing_file_is_an_empty_directory() {
        let temp = tempfile::tempdir().unwrap();
        let directory = FileTicketDirectory::load(&temp.path().join("tickets.jsonl")).unwrap();
        assert!(directory.all().is_empty());
        assert!(directory.get("T-1").unwrap().is_none());
    }

    #[test]
    fn loads_and_finds_tickets() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tickets.jsonl");
        write_tickets(&path, &[snapshot("T-1"), snapshot("T-2")]);

        let directory = FileTicketDirectory::load(&path).unwrap();
        assert_eq!(directory.all().len(), 2);
        assert_eq!(directory.find("T-2").map(|t| t.id.as_str()), Some("T-2"));
    }

    #[test]
    fn priority_raise_persists_to_the_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tickets.jsonl");
        write_tickets(&path, &[snapshot("T-1")]);

        let mut directory = FileTicketDirectory::load(&path).unwrap();
        directory.set_priority("T-1", Priority::Critical).unwrap();

        let reloaded = FileTicketDirectory::load(&path).unwrap();
        assert_eq!(reloaded.find("T-1").unwrap().priority, Priority::Critical);
    }

    #[test]
    fn reassigning_a_missing_ticket_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tickets.jsonl");
        write_tickets(&path, &[snapshot("T-1")]);

        let mut directory = FileTicketDirectory::load(&path).unwrap();
        assert!(matches!(
            directory.reassign("T-404", "agent-lead"),
            Err(DirectoryError::TicketNotFound { .. })
        ));
    }

    #[test]
    fn console_notifier_writes_one_line_per_breach() {
        let mut output = Vec::new();
        {
            let mut notifier = ConsoleNotifier::new(&mut output);
            notifier
                .notify_breach(
                    &snapshot("T-1"),
                    BreachKind::FirstResponse,
                    Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
                )
                .unwrap();
        }
        let output = String::from_utf8(output).unwrap();
        insta::assert_snapshot!(output, @"notice: ticket T-1 breached its first_response deadline (target 2024-01-01T01:00:00+00:00)");
    }
}
