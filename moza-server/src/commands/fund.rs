//! Fund command - credit an account directly, for seeding environments

use anyhow::Result;
use rust_decimal::Decimal;

use moza_core::{EntryPoint, LogEvent};

use super::{get_context, get_logger, log_event};
use crate::output;

pub fn run(account_id: i64, amount: Decimal, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger(EntryPoint::Cli);

    let account = match ctx.transfer_service.fund_account(account_id, amount) {
        Ok(account) => account,
        Err(e) => {
            if let Some(l) = &logger {
                let details = format!("account_id={}", account_id);
                let _ = l.log_error("fund_failed", &e.to_string(), Some(&details));
            }
            return Err(e.into());
        }
    };
    log_event(&logger, LogEvent::new("account_funded").with_command("fund"));

    if json {
        println!("{}", serde_json::to_string_pretty(&account)?);
    } else {
        output::success(&format!(
            "Funded account {} ({}): new balance {} {}",
            account.id, account.account_number, account.balance, account.currency
        ));
    }

    Ok(())
}
