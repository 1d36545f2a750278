//! SLA rule table commands: add, list, enable, disable.

use std::io::Write;
use std::str::FromStr;

use anyhow::{Result, bail};

use sd_core::policy::ActionKind;
use sd_core::types::Priority;

use crate::Config;
use crate::cli::RulesCommand;
use crate::commands::{ensure_allowed, open_database};

pub fn run<W: Write>(writer: &mut W, config: &Config, action: &RulesCommand) -> Result<()> {
    let mut db = open_database(config)?;
    match action {
        RulesCommand::Add {
            name,
            priority,
            first_response,
            resolution,
        } => {
            ensure_allowed(config, ActionKind::ManageRules)?;
            let priority = Priority::from_str(priority)?;
            if !first_response.is_finite() || *first_response <= 0.0 {
                bail!("first-response hours must be positive, got {first_response}");
            }
            if !resolution.is_finite() || *resolution <= 0.0 {
                bail!("resolution hours must be positive, got {resolution}");
            }
            let id = db.insert_rule(name, priority, *first_response, *resolution)?;
            writeln!(writer, "Rule {id} added: {name} ({}).", priority.as_str())?;
        }
        RulesCommand::List => {
            let rules = db.list_rules()?;
            if rules.is_empty() {
                writeln!(writer, "No rules defined.")?;
                return Ok(());
            }
            writeln!(writer, "ID  Name                Priority  FR(h)  Res(h)  Enabled")?;
            for rule in rules {
                writeln!(
                    writer,
                    "{:<3} {:<19} {:<9} {:<6} {:<7} {}",
                    rule.id,
                    rule.name,
                    rule.priority.as_str(),
                    rule.first_response_hours,
                    rule.resolution_hours,
                    if rule.enabled { "yes" } else { "no" }
                )?;
            }
        }
        RulesCommand::Enable { id } => {
            ensure_allowed(config, ActionKind::ManageRules)?;
            set_enabled(writer, &mut db, *id, true)?;
        }
        RulesCommand::Disable { id } => {
            ensure_allowed(config, ActionKind::ManageRules)?;
            set_enabled(writer, &mut db, *id, false)?;
        }
    }
    Ok(())
}

fn set_enabled<W: Write>(
    writer: &mut W,
    db: &mut sd_db::Database,
    id: i64,
    enabled: bool,
) -> Result<()> {
    if db.set_rule_enabled(id, enabled)? {
        let state = if enabled { "enabled" } else { "disabled" };
        writeln!(writer, "Rule {id} {state}.")?;
        Ok(())
    } else {
        bail!("no rule with id {id}")
    }
}
