//! Financial similarity command implementation

use anyhow::{bail, Result};
use zaman_core::db::Database;
use zaman_core::SimilarityService;

use super::{find_user, truncate};

pub fn cmd_similar(db: &Database, username: &str, top: usize) -> Result<()> {
    if top == 0 {
        bail!("--top must be at least 1");
    }

    let user = find_user(db, username)?;
    let service = SimilarityService::new(db);
    let matches = service.find_similar_users(user.id, top)?;

    if matches.is_empty() {
        println!("No other users to compare with '{}'.", username);
        return Ok(());
    }

    println!();
    println!("👥 Users most similar to '{}'", username);
    println!();
    println!(
        "{:>5}  {:<20}  {:>8}  {:>12}  {:>5}  {:>9}",
        "ID", "Username", "Score", "Balance", "Aims", "Savings%"
    );
    println!("{}", "─".repeat(68));

    for (profile, score) in &matches {
        let name = db
            .get_user(profile.user_id)?
            .map(|u| u.username)
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{:>5}  {:<20}  {:>8.3}  {:>12.2}  {:>5}  {:>9.1}",
            profile.user_id,
            truncate(&name, 20),
            score,
            profile.total_balance,
            profile.num_aims,
            profile.savings_rate
        );
    }

    println!();
    Ok(())
}
