//! Escalation sweep command.
//!
//! One sweep per host at a time: a file lock next to the database keeps
//! overlapping cron invocations from stepping on each other. Claims in the
//! database make the sweep idempotent even without the lock; the lock just
//! avoids wasted work and interleaved output.

use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result, bail};
use fs2::FileExt;

use sd_core::policy::ActionKind;

use crate::Config;
use crate::commands::{ensure_allowed, open_service, parse_at};
use crate::tickets::{ConsoleNotifier, FileTicketDirectory};

pub fn run<W: Write>(writer: &mut W, config: &Config, at: Option<&str>) -> Result<()> {
    ensure_allowed(config, ActionKind::RunSweep)?;
    let now = parse_at(at)?;

    let mut service = open_service(config)?;

    let lock_path = config.sweep_lock_path();
    let lock = File::create(&lock_path)
        .with_context(|| format!("failed to create {}", lock_path.display()))?;
    if lock.try_lock_exclusive().is_err() {
        bail!("another sweep is already running (lock: {})", lock_path.display());
    }
    let mut directory = FileTicketDirectory::load(&config.tickets_path)?;
    let summary = {
        let mut notifier = ConsoleNotifier::new(&mut *writer);
        service.run_sweep(now, &mut directory, &mut notifier)?
    };

    writeln!(
        writer,
        "Sweep complete: {} checked, {} escalated, {} errors.",
        summary.checked,
        summary.escalated,
        summary.errors.len()
    )?;
    for error in &summary.errors {
        writeln!(writer, "  {}: {}", error.ticket_id, error.message)?;
    }
    Ok(())
}
