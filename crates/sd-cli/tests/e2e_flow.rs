//! End-to-end tests for the `sd` binary.
//!
//! Drives the full flow through the compiled binary: rules → ticket events →
//! timers → hour accounts → sweep → report, with the database and ticket
//! file isolated in a temp directory via environment overrides.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn sd_binary() -> String {
    env!("CARGO_BIN_EXE_sd").to_string()
}

fn sd(temp: &Path, args: &[&str]) -> Output {
    Command::new(sd_binary())
        .env("SD_DATABASE_PATH", temp.join("sd.db"))
        .env("SD_TICKETS_PATH", temp.join("tickets.jsonl"))
        .args(args)
        .output()
        .expect("failed to run sd")
}

fn sd_ok(temp: &Path, args: &[&str]) -> String {
    let output = sd(temp, args);
    assert!(
        output.status.success(),
        "sd {args:?} should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn seed_tickets(temp: &Path, lines: &[&str]) {
    let mut content = String::new();
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    std::fs::write(temp.join("tickets.jsonl"), content).unwrap();
}

const TICKET_CRITICAL: &str = r#"{"id":"T-1","priority":"critical","status":"open","created_at":"2024-01-01T09:00:00Z","customer_id":"C-1"}"#;
const TICKET_LOW: &str = r#"{"id":"T-2","priority":"low","status":"open","created_at":"2024-01-01T10:00:00Z","customer_id":"C-2"}"#;

#[test]
fn full_flow_from_rule_to_report() {
    let temp = TempDir::new().unwrap();
    seed_tickets(temp.path(), &[TICKET_CRITICAL, TICKET_LOW]);

    let out = sd_ok(
        temp.path(),
        &[
            "rules", "add",
            "--name", "critical-4h",
            "--priority", "critical",
            "--first-response", "1",
            "--resolution", "4",
        ],
    );
    assert!(out.contains("Rule 1 added"), "{out}");

    // Bind the critical ticket; the low one has no rule and stays untracked.
    let out = sd_ok(temp.path(), &["event", "created", "--ticket", "T-1"]);
    assert!(out.contains("bound to rule 1"), "{out}");
    let out = sd_ok(temp.path(), &["event", "created", "--ticket", "T-2"]);
    assert!(out.contains("untracked"), "{out}");

    // Log 90 minutes of work against the ticket.
    sd_ok(
        temp.path(),
        &[
            "timer", "start",
            "--ticket", "T-1",
            "--agent", "agent-1",
            "--at", "2024-01-01T09:00:00Z",
        ],
    );
    let out = sd_ok(
        temp.path(),
        &[
            "timer", "stop",
            "--ticket", "T-1",
            "--agent", "agent-1",
            "--at", "2024-01-01T10:30:00Z",
        ],
    );
    assert!(out.contains("1.50h"), "{out}");

    // Allocation and spend meet in the account summary.
    sd_ok(temp.path(), &["hours", "allocate", "--customer", "C-1", "--hours", "10"]);
    let out = sd_ok(temp.path(), &["hours", "show", "--customer", "C-1"]);
    assert!(out.contains("Spent:     1.50h"), "{out}");
    assert!(out.contains("Remaining: 8.50h"), "{out}");

    // First reply lands within the 1h window.
    let out = sd_ok(
        temp.path(),
        &[
            "event", "first-reply",
            "--ticket", "T-1",
            "--at", "2024-01-01T09:30:00Z",
        ],
    );
    assert!(out.contains("First response recorded"), "{out}");

    let out = sd_ok(
        temp.path(),
        &["sla", "--ticket", "T-1", "--at", "2024-01-01T11:00:00Z"],
    );
    assert!(out.contains("First response: met"), "{out}");
    assert!(out.contains("Resolution: on_track"), "{out}");

    // Close after the 4h resolution window; the miss shows up in the report.
    sd_ok(
        temp.path(),
        &["event", "closed", "--ticket", "T-1", "--at", "2024-01-01T14:00:00Z"],
    );
    let out = sd_ok(
        temp.path(),
        &[
            "report",
            "--start", "2024-01-01T00:00:00Z",
            "--end", "2024-01-02T00:00:00Z",
        ],
    );
    assert!(out.contains("First response met: 100.0%"), "{out}");
    assert!(out.contains("Resolution met:     0.0%"), "{out}");
    assert!(out.contains("Avg resolution: 5.00h"), "{out}");
}

#[test]
fn sweep_escalates_breaches_exactly_once() {
    let temp = TempDir::new().unwrap();
    seed_tickets(temp.path(), &[TICKET_CRITICAL]);

    sd_ok(
        temp.path(),
        &[
            "rules", "add",
            "--name", "critical-4h",
            "--priority", "critical",
            "--first-response", "1",
            "--resolution", "4",
        ],
    );
    sd_ok(temp.path(), &["event", "created", "--ticket", "T-1"]);

    // Both deadlines are past at 14:00, so both breaches escalate.
    let out = sd_ok(temp.path(), &["sweep", "--at", "2024-01-01T14:00:00Z"]);
    assert!(out.contains("1 checked, 2 escalated, 0 errors"), "{out}");
    assert!(out.contains("notice: ticket T-1"), "{out}");

    // Idempotent: the same sweep again claims nothing.
    let out = sd_ok(temp.path(), &["sweep", "--at", "2024-01-01T14:00:00Z"]);
    assert!(out.contains("0 escalated"), "{out}");
}

#[test]
fn duplicate_timer_start_fails_with_conflict() {
    let temp = TempDir::new().unwrap();
    seed_tickets(temp.path(), &[TICKET_CRITICAL]);

    sd_ok(
        temp.path(),
        &[
            "timer", "start",
            "--ticket", "T-1",
            "--agent", "agent-1",
            "--at", "2024-01-01T09:00:00Z",
        ],
    );
    let output = sd(
        temp.path(),
        &[
            "timer", "start",
            "--ticket", "T-1",
            "--agent", "agent-1",
            "--at", "2024-01-01T09:05:00Z",
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already running"), "{stderr}");
}

#[test]
fn json_outputs_parse() {
    let temp = TempDir::new().unwrap();
    seed_tickets(temp.path(), &[TICKET_CRITICAL]);

    sd_ok(
        temp.path(),
        &[
            "rules", "add",
            "--name", "critical-4h",
            "--priority", "critical",
            "--first-response", "1",
            "--resolution", "4",
        ],
    );
    sd_ok(temp.path(), &["event", "created", "--ticket", "T-1"]);

    let out = sd_ok(
        temp.path(),
        &["sla", "--ticket", "T-1", "--at", "2024-01-01T09:10:00Z", "--json"],
    );
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["tracker"]["rule_id"], 1);

    let out = sd_ok(
        temp.path(),
        &[
            "report", "--json",
            "--start", "2024-01-01T00:00:00Z",
            "--end", "2024-01-02T00:00:00Z",
        ],
    );
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["tickets_by_priority"]["critical"], 1);
}
