//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Support desk SLA & time-accounting engine.
///
/// Tracks agent time against tickets and customer hour allocations, holds
/// tickets to SLA deadlines, and escalates breaches on a schedule.
#[derive(Debug, Parser)]
#[command(name = "sd", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show database contents at a glance.
    Status,

    /// Start or stop work timers.
    Timer {
        #[command(subcommand)]
        action: TimerCommand,
    },

    /// Manage customer hour accounts.
    Hours {
        #[command(subcommand)]
        action: HoursCommand,
    },

    /// Manage the SLA rule table.
    Rules {
        #[command(subcommand)]
        action: RulesCommand,
    },

    /// Feed ticket-domain events to the engine.
    Event {
        #[command(subcommand)]
        event: EventCommand,
    },

    /// Show SLA status for a ticket.
    Sla {
        /// The ticket ID.
        #[arg(long)]
        ticket: String,

        /// Evaluate standings at this time (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,

        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Run one escalation sweep.
    Sweep {
        /// Sweep as of this time (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Analytics rollups over tickets and trackers.
    Report {
        /// Period start (RFC 3339). Defaults to 7 days before the end.
        #[arg(long)]
        start: Option<String>,

        /// Period end (RFC 3339). Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Timer control.
#[derive(Debug, Subcommand)]
pub enum TimerCommand {
    /// Start a timer for an agent on a ticket.
    Start {
        /// The ticket ID.
        #[arg(long)]
        ticket: String,

        /// The agent working the ticket.
        #[arg(long)]
        agent: String,

        /// Start time (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Stop the running timer for an agent on a ticket.
    Stop {
        /// The ticket ID.
        #[arg(long)]
        ticket: String,

        /// The agent working the ticket.
        #[arg(long)]
        agent: String,

        /// Stop time (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Show hours logged against a ticket, running timers included.
    Elapsed {
        /// The ticket ID.
        #[arg(long)]
        ticket: String,

        /// Evaluate at this time (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,
    },
}

/// Hour account management.
#[derive(Debug, Subcommand)]
pub enum HoursCommand {
    /// Add allocated hours to a customer account.
    Allocate {
        /// The customer ID.
        #[arg(long)]
        customer: String,

        /// Hours to add.
        #[arg(long)]
        hours: f64,
    },

    /// Show allocated/spent/remaining for a customer.
    Show {
        /// The customer ID.
        #[arg(long)]
        customer: String,

        /// Evaluate at this time (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,
    },
}

/// SLA rule management.
#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// Add a rule.
    Add {
        /// Rule name (e.g. "critical-4h").
        #[arg(long)]
        name: String,

        /// Ticket priority the rule applies to.
        #[arg(long)]
        priority: String,

        /// First-response deadline in hours.
        #[arg(long)]
        first_response: f64,

        /// Resolution deadline in hours.
        #[arg(long)]
        resolution: f64,
    },

    /// List all rules.
    List,

    /// Enable a rule.
    Enable {
        /// The rule ID.
        #[arg(long)]
        id: i64,
    },

    /// Disable a rule.
    Disable {
        /// The rule ID.
        #[arg(long)]
        id: i64,
    },
}

/// Ticket-domain events.
#[derive(Debug, Subcommand)]
pub enum EventCommand {
    /// A ticket was created; bind it to a matching SLA rule.
    Created {
        /// The ticket ID (looked up in the ticket file).
        #[arg(long)]
        ticket: String,
    },

    /// The first agent reply was posted.
    FirstReply {
        /// The ticket ID.
        #[arg(long)]
        ticket: String,

        /// Reply time (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,
    },

    /// The ticket was closed.
    Closed {
        /// The ticket ID.
        #[arg(long)]
        ticket: String,

        /// Close time (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,
    },

    /// The ticket's priority changed.
    Priority {
        /// The ticket ID.
        #[arg(long)]
        ticket: String,

        /// The new priority.
        #[arg(long)]
        priority: String,
    },
}
