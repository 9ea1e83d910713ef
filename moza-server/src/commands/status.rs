//! Status command - show store counts and balances per currency

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Moza Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec!["Bank Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Cards", &status.total_cards.to_string()]);
    table.add_row(vec!["Transactions", &status.total_transactions.to_string()]);
    println!("{}", table);
    println!();

    if !status.balances.is_empty() {
        println!("{}", "Balances".bold());
        let mut balances = output::create_table();
        balances.set_header(vec!["Currency", "Accounts", "Total"]);
        for total in &status.balances {
            balances.add_row(vec![
                total.currency.clone(),
                total.accounts.to_string(),
                total.total_balance.to_string(),
            ]);
        }
        println!("{}", balances);
    }

    if !status.pending_migrations.is_empty() {
        println!();
        output::warning(&format!(
            "{} pending migration(s); run `moza migrate`",
            status.pending_migrations.len()
        ));
    }

    Ok(())
}
