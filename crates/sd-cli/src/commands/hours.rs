//! Hour account commands: allocate, show.

use std::io::Write;

use anyhow::Result;

use sd_core::policy::ActionKind;
use sd_core::types::CustomerId;

use crate::Config;
use crate::cli::HoursCommand;
use crate::commands::{ensure_allowed, open_service, parse_at};

pub fn run<W: Write>(writer: &mut W, config: &Config, action: &HoursCommand) -> Result<()> {
    let mut service = open_service(config)?;
    match action {
        HoursCommand::Allocate { customer, hours } => {
            ensure_allowed(config, ActionKind::AllocateHours)?;
            let customer_id = CustomerId::new(customer.as_str())?;
            let account = service.allocate_hours(&customer_id, *hours, chrono::Utc::now())?;
            writeln!(
                writer,
                "Allocated {hours:.2}h to {customer}: {:.2}h total, {:.2}h remaining.",
                account.hours_allocated, account.hours_remaining
            )?;
        }
        HoursCommand::Show { customer, at } => {
            let customer_id = CustomerId::new(customer.as_str())?;
            let now = parse_at(at.as_deref())?;
            let account = service.customer_hours(&customer_id, now)?;
            writeln!(writer, "Customer:  {}", account.customer_id)?;
            writeln!(writer, "Allocated: {:.2}h", account.hours_allocated)?;
            writeln!(writer, "Spent:     {:.2}h", account.hours_spent)?;
            writeln!(writer, "Remaining: {:.2}h", account.hours_remaining)?;
            if account.hours_remaining < 0.0 {
                writeln!(writer, "Account is over its allocation.")?;
            }
        }
    }
    Ok(())
}
