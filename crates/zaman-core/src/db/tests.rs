//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use rusqlite::params;

    fn user_with_balance(db: &Database, name: &str, balance: f64) -> User {
        db.create_user(name, &format!("{}@example.com", name), "hash", balance)
            .unwrap()
    }

    fn aim(db: &Database, user_id: i64, target: f64) -> FinancialAim {
        db.create_aim(
            user_id,
            &NewFinancialAim {
                title: "Apartment".to_string(),
                description: None,
                target_amount: target,
                current_amount: 0.0,
            },
        )
        .unwrap()
    }

    fn total_funds(db: &Database, user_id: i64) -> f64 {
        let bank = db.get_bank_account_for_user(user_id).unwrap().unwrap().balance;
        let aims: f64 = db
            .list_aims(user_id)
            .unwrap()
            .iter()
            .map(|a| a.current_amount)
            .sum();
        bank + aims
    }

    fn tx_at(db: &Database, user_id: i64, description: &str, kind: TransactionType, at: DateTime<Utc>) {
        db.insert_transaction(&NewTransaction {
            user_id,
            amount: 10.0,
            description: description.to_string(),
            transaction_type: kind,
            created_at: at,
            updated_at: at,
        })
        .unwrap();
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_users().unwrap().is_empty());
        assert_eq!(db.count_users().unwrap(), 0);
    }

    #[test]
    fn test_in_memory_files_removed_on_drop() {
        let db = Database::in_memory().unwrap();
        user_with_balance(&db, "aigerim", 10.0);
        let dir = std::path::Path::new(db.path()).parent().unwrap().to_path_buf();
        assert!(dir.exists());

        let clone = db.clone();
        drop(db);
        assert!(dir.exists());
        assert_eq!(clone.count_users().unwrap(), 1);

        drop(clone);
        assert!(!dir.exists());
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        for table in [
            "users",
            "bank_accounts",
            "financial_aims",
            "transactions",
            "financial_transactions",
            "chat_sessions",
            "chat_messages",
            "audit_log",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_create_user_opens_bank_account() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "aigerim", 5000.0);

        let account = db.get_bank_account_for_user(user.id).unwrap().unwrap();
        assert_eq!(account.user_id, user.id);
        assert_eq!(account.balance, 5000.0);

        let creds = db.get_user_credentials("aigerim").unwrap().unwrap();
        assert_eq!(creds.id, user.id);
        assert_eq!(creds.password_hash, "hash");
    }

    #[test]
    fn test_operator_username_reserved() {
        let db = Database::in_memory().unwrap();
        for name in ["cli", " CLI "] {
            let err = db
                .create_user(name, "op@example.com", "hash", 0.0)
                .unwrap_err();
            assert!(matches!(err, Error::InvalidData(ref m) if m == "Username is reserved"));
        }
        assert_eq!(db.count_users().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_username_and_email_conflict() {
        let db = Database::in_memory().unwrap();
        user_with_balance(&db, "aigerim", 0.0);

        let err = db
            .create_user("aigerim", "other@example.com", "hash", 0.0)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m == "Username already taken"));

        let err = db
            .create_user("dana", "aigerim@example.com", "hash", 0.0)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Failed registrations leave nothing behind
        assert_eq!(db.count_users().unwrap(), 1);
        let accounts: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM bank_accounts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(accounts, 1);
    }

    #[test]
    fn test_aim_crud_is_owner_scoped() {
        let db = Database::in_memory().unwrap();
        let alice = user_with_balance(&db, "alice", 0.0);
        let bob = user_with_balance(&db, "bob", 0.0);

        let created = aim(&db, alice.id, 1000.0);
        assert_eq!(created.current_amount, 0.0);
        assert!(!created.is_completed);

        assert!(db.get_aim(bob.id, created.id).unwrap().is_none());
        assert!(db
            .update_aim(bob.id, created.id, &FinancialAimUpdate::default())
            .unwrap()
            .is_none());
        assert!(!db.delete_aim(bob.id, created.id).unwrap());

        let updated = db
            .update_aim(
                alice.id,
                created.id,
                &FinancialAimUpdate {
                    title: Some("Flat".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Flat");
        assert_eq!(updated.target_amount, 1000.0);

        assert!(db.delete_aim(alice.id, created.id).unwrap());
        assert!(db.list_aims(alice.id).unwrap().is_empty());
    }

    #[test]
    fn test_aim_validation() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 0.0);

        let err = db
            .create_aim(
                user.id,
                &NewFinancialAim {
                    title: "  ".to_string(),
                    description: None,
                    target_amount: 10.0,
                    current_amount: 0.0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));

        let err = db
            .create_aim(
                user.id,
                &NewFinancialAim {
                    title: "Car".to_string(),
                    description: None,
                    target_amount: 0.0,
                    current_amount: 0.0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_deposit_and_withdrawal_preserve_total() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 1000.0);
        let goal = aim(&db, user.id, 500.0);

        db.apply_financial_transaction(user.id, goal.id, 300.0, FinancialTransactionType::Deposit)
            .unwrap();
        assert_eq!(total_funds(&db, user.id), 1000.0);
        assert_eq!(
            db.get_bank_account_for_user(user.id).unwrap().unwrap().balance,
            700.0
        );

        let row = db
            .apply_financial_transaction(
                user.id,
                goal.id,
                100.0,
                FinancialTransactionType::Withdrawal,
            )
            .unwrap();
        assert_eq!(row.transaction_type, FinancialTransactionType::Withdrawal);
        assert_eq!(db.get_aim(user.id, goal.id).unwrap().unwrap().current_amount, 200.0);
        assert_eq!(total_funds(&db, user.id), 1000.0);
    }

    #[test]
    fn test_insufficient_funds_leaves_balances_untouched() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 100.0);
        let goal = aim(&db, user.id, 500.0);

        let err = db
            .apply_financial_transaction(user.id, goal.id, 150.0, FinancialTransactionType::Deposit)
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient funds in bank account");

        let err = db
            .apply_financial_transaction(
                user.id,
                goal.id,
                1.0,
                FinancialTransactionType::Withdrawal,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient funds in aim account");

        assert_eq!(
            db.get_bank_account_for_user(user.id).unwrap().unwrap().balance,
            100.0
        );
        assert!(db.list_user_aim_transactions(user.id).unwrap().is_empty());
    }

    #[test]
    fn test_ledger_rejects_bad_amount_and_foreign_aim() {
        let db = Database::in_memory().unwrap();
        let alice = user_with_balance(&db, "alice", 100.0);
        let bob = user_with_balance(&db, "bob", 100.0);
        let goal = aim(&db, alice.id, 500.0);

        for amount in [0.0, -5.0, f64::NAN] {
            let err = db
                .apply_financial_transaction(
                    alice.id,
                    goal.id,
                    amount,
                    FinancialTransactionType::Deposit,
                )
                .unwrap_err();
            assert!(matches!(err, Error::InvalidData(_)));
        }

        let err = db
            .apply_financial_transaction(bob.id, goal.id, 10.0, FinancialTransactionType::Deposit)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = db.list_aim_transactions(bob.id, goal.id).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_aim_completes_when_funded() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 1000.0);
        let goal = aim(&db, user.id, 250.0);

        db.apply_financial_transaction(user.id, goal.id, 250.0, FinancialTransactionType::Deposit)
            .unwrap();
        assert!(db.get_aim(user.id, goal.id).unwrap().unwrap().is_completed);
    }

    #[test]
    fn test_ledger_listing_newest_first() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 1000.0);
        let first = aim(&db, user.id, 500.0);
        let second = aim(&db, user.id, 500.0);

        db.apply_financial_transaction(user.id, first.id, 10.0, FinancialTransactionType::Deposit)
            .unwrap();
        db.apply_financial_transaction(user.id, second.id, 20.0, FinancialTransactionType::Deposit)
            .unwrap();
        db.apply_financial_transaction(user.id, first.id, 30.0, FinancialTransactionType::Deposit)
            .unwrap();

        let for_first = db.list_aim_transactions(user.id, first.id).unwrap();
        assert_eq!(
            for_first.iter().map(|t| t.amount).collect::<Vec<_>>(),
            vec![30.0, 10.0]
        );

        let all = db.list_user_aim_transactions(user.id).unwrap();
        assert_eq!(
            all.iter().map(|t| t.amount).collect::<Vec<_>>(),
            vec![30.0, 20.0, 10.0]
        );
    }

    #[test]
    fn test_delete_aim_returns_funds() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 400.0);
        let goal = aim(&db, user.id, 500.0);

        db.apply_financial_transaction(user.id, goal.id, 150.0, FinancialTransactionType::Deposit)
            .unwrap();
        assert!(db.delete_aim(user.id, goal.id).unwrap());

        assert_eq!(
            db.get_bank_account_for_user(user.id).unwrap().unwrap().balance,
            400.0
        );
        assert!(db.list_user_aim_transactions(user.id).unwrap().is_empty());
    }

    #[test]
    fn test_adjust_bank_balance() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 10.0);

        let account = db.adjust_bank_balance(user.id, 90.0).unwrap();
        assert_eq!(account.balance, 100.0);

        let err = db.adjust_bank_balance(user.id, -101.0).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds(_)));

        let err = db.adjust_bank_balance(9999, 1.0).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_transaction_date_filters_are_whole_day_inclusive() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 0.0);

        let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
        tx_at(&db, user.id, "Store", TransactionType::Withdrawal, day(1, 23));
        tx_at(&db, user.id, "Bill", TransactionType::Withdrawal, day(2, 0));
        tx_at(&db, user.id, "Store", TransactionType::Deposit, day(3, 23));
        tx_at(&db, user.id, "Store", TransactionType::Transfer, day(4, 0));

        let query = TransactionQuery {
            date_from: NaiveDate::from_ymd_opt(2024, 3, 2),
            date_to: NaiveDate::from_ymd_opt(2024, 3, 3),
            ..Default::default()
        };
        let rows = db.list_transactions(user.id, &query).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "Store");
        assert_eq!(rows[1].description, "Bill");

        let query = TransactionQuery {
            description: Some("Store".to_string()),
            transaction_type: Some(TransactionType::Withdrawal),
            ..Default::default()
        };
        let rows = db.list_transactions(user.id, &query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].created_at, day(1, 23));
    }

    #[test]
    fn test_transactions_are_owner_scoped() {
        let db = Database::in_memory().unwrap();
        let alice = user_with_balance(&db, "alice", 0.0);
        let bob = user_with_balance(&db, "bob", 0.0);

        tx_at(&db, alice.id, "Fee", TransactionType::Withdrawal, Utc::now());
        let row = db
            .list_transactions(alice.id, &TransactionQuery::default())
            .unwrap()
            .remove(0);

        assert!(db.get_transaction(bob.id, row.id).unwrap().is_none());
        assert!(db.get_transaction(alice.id, row.id).unwrap().is_some());
        assert!(db
            .list_transactions(bob.id, &TransactionQuery::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_top_categories() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 0.0);
        let now = Utc::now();

        for _ in 0..3 {
            tx_at(&db, user.id, "Bill", TransactionType::Withdrawal, now);
        }
        tx_at(&db, user.id, "Fee", TransactionType::Withdrawal, now);
        tx_at(&db, user.id, "Store", TransactionType::Withdrawal, now);
        tx_at(&db, user.id, "Store", TransactionType::Withdrawal, now);

        let top = db.top_transaction_categories(user.id, 10).unwrap();
        let names: Vec<_> = top.iter().map(|c| c.description.as_str()).collect();
        assert_eq!(names, vec!["Bill", "Store", "Fee"]);
        assert_eq!(top[0].count, 3);

        assert_eq!(db.top_transaction_categories(user.id, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_generate_transactions() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 0.0);

        let last = db.generate_transactions(user.id, 25).unwrap();
        assert_eq!(last.user_id, user.id);

        let rows = db
            .list_transactions(user.id, &TransactionQuery::default())
            .unwrap();
        assert_eq!(rows.len(), 25);
        assert_eq!(db.count_transactions(user.id).unwrap(), 25);

        let oldest_allowed = Utc::now() - Duration::days(181);
        for row in &rows {
            assert!((10.0..=1000.0).contains(&row.amount));
            assert!(GENERATED_DESCRIPTIONS.contains(&row.description.as_str()));
            assert!(row.created_at >= oldest_allowed);
            assert!(row.updated_at >= row.created_at);
        }

        assert!(matches!(
            db.generate_transactions(user.id, 0).unwrap_err(),
            Error::InvalidData(_)
        ));
    }

    #[test]
    fn test_chat_session_get_or_create() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 0.0);

        let mut session = db.get_or_create_chat_session(user.id, "abc").unwrap();
        assert_eq!(session.stage, ChatStage::Discovery);
        assert_eq!(session.goal, ChatGoal::default());

        session.stage = ChatStage::Clarification;
        session.goal.goal_type = Some("apartment".to_string());
        session.goal.products = Some(vec!["Ипотечный кредит".to_string()]);
        db.save_chat_session(&session).unwrap();

        let again = db.get_or_create_chat_session(user.id, "abc").unwrap();
        assert_eq!(again.id, session.id);
        assert_eq!(again.stage, ChatStage::Clarification);
        assert_eq!(again.goal, session.goal);

        // Same public id under another user is a different session
        let bob = user_with_balance(&db, "bob", 0.0);
        let other = db.get_or_create_chat_session(bob.id, "abc").unwrap();
        assert_ne!(other.id, session.id);
        assert_eq!(other.stage, ChatStage::Discovery);
    }

    #[test]
    fn test_chat_history_window() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 0.0);
        let session = db.get_or_create_chat_session(user.id, "s1").unwrap();

        for i in 0..5 {
            db.append_chat_message(session.id, "user", &format!("m{}", i))
                .unwrap();
        }

        let recent = db.recent_chat_messages(session.id, 3).unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);

        assert!(db.delete_chat_session(user.id, "s1").unwrap());
        assert!(db.recent_chat_messages(session.id, 3).unwrap().is_empty());
        assert!(!db.delete_chat_session(user.id, "s1").unwrap());
    }

    #[test]
    fn test_stats_aggregates() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 1000.0);
        let a = aim(&db, user.id, 100.0);
        let b = aim(&db, user.id, 400.0);

        db.apply_financial_transaction(user.id, a.id, 100.0, FinancialTransactionType::Deposit)
            .unwrap();
        db.apply_financial_transaction(user.id, b.id, 200.0, FinancialTransactionType::Deposit)
            .unwrap();
        db.apply_financial_transaction(user.id, b.id, 100.0, FinancialTransactionType::Withdrawal)
            .unwrap();

        let accounts = db
            .account_stats(user.id, Utc::now() + Duration::days(2))
            .unwrap();
        assert_eq!(accounts.num_accounts, 1);
        assert_eq!(accounts.total_balance, 800.0);
        assert!(accounts.avg_account_age_days > 1.9 && accounts.avg_account_age_days < 2.1);

        let ledger = db.ledger_stats(user.id).unwrap();
        assert_eq!(ledger.total_transactions, 3);
        assert_eq!(ledger.total_deposit, 300.0);
        assert_eq!(ledger.total_withdrawal, 100.0);
        assert!((ledger.avg_transaction_amount - 400.0 / 3.0).abs() < 1e-9);
        assert!(ledger.first_transaction_at.is_some());

        let aims = db.aim_stats(user.id).unwrap();
        assert_eq!(aims.num_aims, 2);
        assert_eq!(aims.total_target_amount, 500.0);
        assert_eq!(aims.total_current_amount, 200.0);
        assert_eq!(aims.num_completed_aims, 1);
        assert!((aims.avg_aim_progress - 62.5).abs() < 1e-9);

        let flow = db
            .ledger_flow_since(user.id, Utc::now() - Duration::days(90))
            .unwrap();
        assert_eq!(flow.income, 300.0);
        assert_eq!(flow.outcome, 100.0);
        assert_eq!(flow.net, 200.0);
    }

    #[test]
    fn test_stats_for_empty_user() {
        let db = Database::in_memory().unwrap();
        let user = user_with_balance(&db, "alice", 0.0);

        assert_eq!(db.ledger_stats(user.id).unwrap(), LedgerStats::default());
        assert_eq!(db.aim_stats(user.id).unwrap(), AimStats::default());
    }

    #[test]
    fn test_audit_log_scoped_to_user() {
        let db = Database::in_memory().unwrap();

        db.log_audit("alice", "login", None, None, None).unwrap();
        db.log_audit("alice", "create", Some("financial_aim"), Some(1), Some("Car"))
            .unwrap();
        db.log_audit("bob", "login", None, None, None).unwrap();

        let entries = db.list_audit_log("alice", 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "create");
        assert_eq!(entries[0].entity_id, Some(1));
        assert_eq!(db.list_audit_log("alice", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_encrypted_database_requires_key() {
        let dir = std::env::temp_dir().join(format!("zaman_enc_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("enc.db");
        let path = path.to_str().unwrap();
        let _ = std::fs::remove_file(path);

        {
            let db = Database::new_with_key(path, Some("correct horse")).unwrap();
            user_with_balance(&db, "alice", 1.0);
        }

        let reopened = Database::new_with_key(path, Some("correct horse")).unwrap();
        assert_eq!(reopened.count_users().unwrap(), 1);

        assert!(Database::new_with_key(path, Some("wrong")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
