//! Bank account command implementations (users, fund, seed)

use anyhow::{bail, Context, Result};
use zaman_core::db::{Database, MAX_GENERATED_TRANSACTIONS, OPERATOR_AUDIT_USER};

use super::{find_user, truncate};

pub fn cmd_users(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No users registered yet.");
        return Ok(());
    }

    println!();
    println!(
        "{:>5}  {:<20}  {:<28}  {:>12}  {:>5}",
        "ID", "Username", "Email", "Balance", "Aims"
    );
    println!("{}", "─".repeat(78));

    for user in &users {
        let balance = db
            .get_bank_account_for_user(user.id)?
            .map(|a| a.balance)
            .unwrap_or(0.0);
        let aims = db.list_aims(user.id)?.len();
        println!(
            "{:>5}  {:<20}  {:<28}  {:>12.2}  {:>5}",
            user.id,
            truncate(&user.username, 20),
            truncate(&user.email, 28),
            balance,
            aims
        );
    }

    println!();
    println!("Total: {} users", users.len());
    Ok(())
}

pub fn cmd_fund(db: &Database, username: &str, amount: f64) -> Result<()> {
    if amount == 0.0 {
        bail!("Amount must not be zero");
    }

    let user = find_user(db, username)?;
    let account = db
        .adjust_bank_balance(user.id, amount)
        .with_context(|| format!("Failed to fund account of '{}'", username))?;

    db.log_audit(
        OPERATOR_AUDIT_USER,
        "fund",
        Some("bank_account"),
        Some(account.id),
        Some(&format!("user={}, amount={:.2}", username, amount)),
    )?;

    println!(
        "✅ {} {:.2} - balance of '{}' is now {:.2}",
        if amount > 0.0 { "Added" } else { "Withdrew" },
        amount.abs(),
        username,
        account.balance
    );
    Ok(())
}

pub fn cmd_seed(db: &Database, username: &str, count: usize) -> Result<()> {
    if count == 0 || count > MAX_GENERATED_TRANSACTIONS {
        bail!(
            "Count must be between 1 and {}",
            MAX_GENERATED_TRANSACTIONS
        );
    }

    let user = find_user(db, username)?;
    let last = db
        .generate_transactions(user.id, count)
        .context("Failed to generate transactions")?;

    db.log_audit(
        OPERATOR_AUDIT_USER,
        "generate",
        Some("transaction"),
        Some(last.id),
        Some(&format!("user={}, count={}", username, count)),
    )?;

    println!(
        "✅ Generated {} transactions for '{}' (total: {})",
        count,
        username,
        db.count_transactions(user.id)?
    );
    Ok(())
}
