//! Financial similarity between users
//!
//! Each user is reduced to a 16-feature profile built from SQL aggregates.
//! Profiles are z-score standardized across the compared population and
//! ranked by cosine similarity.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{AccountStats, AimStats, FinancialAim, FlowSummary, LedgerStats};

/// Number of features in a profile vector
pub const FEATURE_COUNT: usize = 16;

/// Feature names in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "total_balance",
    "num_accounts",
    "avg_account_age_days",
    "total_transactions",
    "total_deposit",
    "total_withdrawal",
    "avg_transaction_amount",
    "transaction_frequency",
    "num_aims",
    "total_target_amount",
    "total_current_amount",
    "completion_rate",
    "avg_aim_progress",
    "num_completed_aims",
    "savings_rate",
    "net_flow",
];

/// Default number of neighbours returned by `find_similar_users`
pub const DEFAULT_TOP_N: usize = 5;

/// Window for the income/outcome summary
const SUMMARY_WINDOW_DAYS: i64 = 90;

pub type FeatureVector = [f64; FEATURE_COUNT];

/// Aggregated financial behaviour of one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserFinancialProfile {
    pub user_id: i64,
    pub total_balance: f64,
    pub num_accounts: i64,
    pub avg_account_age_days: f64,
    pub total_transactions: i64,
    pub total_deposit: f64,
    pub total_withdrawal: f64,
    pub avg_transaction_amount: f64,
    /// Ledger rows per active day
    pub transaction_frequency: f64,
    pub num_aims: i64,
    pub total_target_amount: f64,
    pub total_current_amount: f64,
    /// Completed aims as a percentage of all aims
    pub completion_rate: f64,
    pub avg_aim_progress: f64,
    pub num_completed_aims: i64,
    /// Saved share of all targets, in percent
    pub savings_rate: f64,
    pub net_flow: f64,
}

impl UserFinancialProfile {
    /// Derive a profile from raw aggregates as of `now`
    pub fn from_stats(
        user_id: i64,
        accounts: &AccountStats,
        ledger: &LedgerStats,
        aims: &AimStats,
        now: DateTime<Utc>,
    ) -> Self {
        let transaction_frequency = match ledger.first_transaction_at {
            Some(first) if ledger.total_transactions > 0 => {
                let days_active = (now - first).num_days().max(1);
                ledger.total_transactions as f64 / days_active as f64
            }
            _ => 0.0,
        };

        let completion_rate = if aims.num_aims > 0 {
            aims.num_completed_aims as f64 / aims.num_aims as f64 * 100.0
        } else {
            0.0
        };

        let savings_rate = if aims.total_target_amount > 0.0 {
            aims.total_current_amount / aims.total_target_amount * 100.0
        } else {
            0.0
        };

        Self {
            user_id,
            total_balance: accounts.total_balance,
            num_accounts: accounts.num_accounts,
            avg_account_age_days: accounts.avg_account_age_days,
            total_transactions: ledger.total_transactions,
            total_deposit: ledger.total_deposit,
            total_withdrawal: ledger.total_withdrawal,
            avg_transaction_amount: ledger.avg_transaction_amount,
            transaction_frequency,
            num_aims: aims.num_aims,
            total_target_amount: aims.total_target_amount,
            total_current_amount: aims.total_current_amount,
            completion_rate,
            avg_aim_progress: aims.avg_aim_progress,
            num_completed_aims: aims.num_completed_aims,
            savings_rate,
            net_flow: ledger.total_deposit - ledger.total_withdrawal,
        }
    }

    /// Feature vector in `FEATURE_NAMES` order
    pub fn to_vector(&self) -> FeatureVector {
        [
            self.total_balance,
            self.num_accounts as f64,
            self.avg_account_age_days,
            self.total_transactions as f64,
            self.total_deposit,
            self.total_withdrawal,
            self.avg_transaction_amount,
            self.transaction_frequency,
            self.num_aims as f64,
            self.total_target_amount,
            self.total_current_amount,
            self.completion_rate,
            self.avg_aim_progress,
            self.num_completed_aims as f64,
            self.savings_rate,
            self.net_flow,
        ]
    }
}

/// Z-score each column using the population standard deviation
///
/// Zero-variance columns map to 0.
pub fn standardize(rows: &[FeatureVector]) -> Vec<FeatureVector> {
    if rows.is_empty() {
        return Vec::new();
    }
    let n = rows.len() as f64;

    let mut mean = [0.0; FEATURE_COUNT];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v / n;
        }
    }

    let mut std = [0.0; FEATURE_COUNT];
    for row in rows {
        for ((s, v), m) in std.iter_mut().zip(row).zip(&mean) {
            *s += (v - m).powi(2) / n;
        }
    }
    for s in std.iter_mut() {
        *s = s.sqrt();
    }

    rows.iter()
        .map(|row| {
            let mut out = [0.0; FEATURE_COUNT];
            for i in 0..FEATURE_COUNT {
                // Tolerate float noise on constant columns
                out[i] = if std[i] > f64::EPSILON * mean[i].abs().max(1.0) {
                    (row[i] - mean[i]) / std[i]
                } else {
                    0.0
                };
            }
            out
        })
        .collect()
}

/// Cosine of the angle between two vectors; 0 when either is all zeros
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One aim in a summary
#[derive(Debug, Clone, Serialize)]
pub struct AimSummaryItem {
    pub title: String,
    pub description: Option<String>,
    pub target_amount: f64,
    pub current_amount: f64,
    pub progress_percent: f64,
}

/// Completed and in-progress aims of a user
#[derive(Debug, Clone, Serialize)]
pub struct AimsSummary {
    pub completed_aims: Vec<AimSummaryItem>,
    pub in_progress_aims: Vec<AimSummaryItem>,
    pub total_completed: usize,
    pub total_in_progress: usize,
}

impl AimsSummary {
    pub fn from_aims(aims: &[FinancialAim]) -> Self {
        let (completed, in_progress): (Vec<_>, Vec<_>) =
            aims.iter().partition(|aim| aim.is_completed);

        let item = |aim: &&FinancialAim| AimSummaryItem {
            title: aim.title.clone(),
            description: aim.description.clone(),
            target_amount: aim.target_amount,
            current_amount: aim.current_amount,
            progress_percent: round2(aim.progress_percent()),
        };

        Self {
            total_completed: completed.len(),
            total_in_progress: in_progress.len(),
            completed_aims: completed.iter().map(item).collect(),
            in_progress_aims: in_progress.iter().map(item).collect(),
        }
    }
}

/// Headline figures of a similar user
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub total_balance: f64,
    pub num_transactions: i64,
    pub num_aims: i64,
    pub savings_rate: f64,
    pub completion_rate: f64,
    pub three_month_summary: FlowSummary,
    pub aims_summary: AimsSummary,
}

/// A ranked neighbour
#[derive(Debug, Clone, Serialize)]
pub struct SimilarUser {
    pub user_id: i64,
    pub similarity_score: f64,
    pub profile_summary: ProfileSummary,
}

/// Result of a neighbour search
#[derive(Debug, Clone, Serialize)]
pub struct SimilarUsersReport {
    pub user_id: i64,
    pub similar_users: Vec<SimilarUser>,
}

/// One feature compared between two users
#[derive(Debug, Clone, Serialize)]
pub struct FeatureComparison {
    pub feature: &'static str,
    pub user1: f64,
    pub user2: f64,
    pub normalized_difference: f64,
    pub raw_difference: f64,
    /// Raw difference relative to the mean of both values, in percent
    pub percent_difference: f64,
}

/// A user's profile with its summaries
#[derive(Debug, Clone, Serialize)]
pub struct ComparedUser {
    #[serde(flatten)]
    pub profile: UserFinancialProfile,
    pub three_month_summary: FlowSummary,
    pub aims_summary: AimsSummary,
}

/// Standardized vectors of both compared users
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedVectors {
    pub user1: Vec<f64>,
    pub user2: Vec<f64>,
}

/// Detailed explanation of how two users relate
#[derive(Debug, Clone, Serialize)]
pub struct UserComparison {
    pub similarity_score: f64,
    pub user1: ComparedUser,
    pub user2: ComparedUser,
    pub feature_comparison: Vec<FeatureComparison>,
    pub normalized_vectors: NormalizedVectors,
}

/// Computes profiles and similarities from the database
pub struct SimilarityService<'a> {
    db: &'a Database,
}

impl<'a> SimilarityService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Profile of one user; `NotFound` for an unknown id
    pub fn profile(&self, user_id: i64) -> Result<UserFinancialProfile> {
        if self.db.get_user(user_id)?.is_none() {
            return Err(Error::NotFound(format!("User {} not found", user_id)));
        }
        self.profile_at(user_id, Utc::now())
    }

    fn profile_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<UserFinancialProfile> {
        Ok(UserFinancialProfile::from_stats(
            user_id,
            &self.db.account_stats(user_id, now)?,
            &self.db.ledger_stats(user_id)?,
            &self.db.aim_stats(user_id)?,
            now,
        ))
    }

    /// Profiles of every user, all measured against the same clock
    fn all_profiles(&self) -> Result<Vec<UserFinancialProfile>> {
        let now = Utc::now();
        self.db
            .list_user_ids()?
            .into_iter()
            .map(|id| self.profile_at(id, now))
            .collect()
    }

    /// Income/outcome over the last 90 days
    pub fn three_month_summary(&self, user_id: i64) -> Result<FlowSummary> {
        self.db
            .ledger_flow_since(user_id, Utc::now() - Duration::days(SUMMARY_WINDOW_DAYS))
    }

    /// Completed and in-progress aims
    pub fn aims_summary(&self, user_id: i64) -> Result<AimsSummary> {
        Ok(AimsSummary::from_aims(&self.db.list_aims(user_id)?))
    }

    /// Rank every other user by similarity to `user_id`
    ///
    /// Empty when the user is unknown or alone. Ties break by user id.
    pub fn find_similar_users(
        &self,
        user_id: i64,
        top_n: usize,
    ) -> Result<Vec<(UserFinancialProfile, f64)>> {
        let profiles = self.all_profiles()?;

        let Some(target) = profiles.iter().find(|p| p.user_id == user_id) else {
            return Ok(Vec::new());
        };
        let others: Vec<&UserFinancialProfile> =
            profiles.iter().filter(|p| p.user_id != user_id).collect();
        if others.is_empty() {
            return Ok(Vec::new());
        }

        // Target first, then the others, scaled together
        let vectors: Vec<FeatureVector> = std::iter::once(target)
            .chain(others.iter().copied())
            .map(UserFinancialProfile::to_vector)
            .collect();
        let normalized = standardize(&vectors);

        let mut scored: Vec<(UserFinancialProfile, f64)> = others
            .into_iter()
            .zip(normalized.iter().skip(1))
            .map(|(profile, vector)| {
                (profile.clone(), cosine_similarity(&normalized[0], vector))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.user_id.cmp(&b.0.user_id))
        });
        scored.truncate(top_n);

        debug!(user_id, found = scored.len(), "Similar users ranked");
        Ok(scored)
    }

    /// Neighbour search enriched with summaries for each match
    pub fn similar_users_report(&self, user_id: i64, top_n: usize) -> Result<SimilarUsersReport> {
        let similar_users = self
            .find_similar_users(user_id, top_n)?
            .into_iter()
            .map(|(profile, score)| {
                Ok(SimilarUser {
                    user_id: profile.user_id,
                    similarity_score: score,
                    profile_summary: ProfileSummary {
                        total_balance: profile.total_balance,
                        num_transactions: profile.total_transactions,
                        num_aims: profile.num_aims,
                        savings_rate: profile.savings_rate,
                        completion_rate: profile.completion_rate,
                        three_month_summary: self.three_month_summary(profile.user_id)?,
                        aims_summary: self.aims_summary(profile.user_id)?,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SimilarUsersReport {
            user_id,
            similar_users,
        })
    }

    /// Compare two users, scaling against the whole user base
    pub fn compare_users(&self, user1_id: i64, user2_id: i64) -> Result<UserComparison> {
        let profiles = self.all_profiles()?;

        let idx1 = profiles.iter().position(|p| p.user_id == user1_id);
        let idx2 = profiles.iter().position(|p| p.user_id == user2_id);
        let (Some(idx1), Some(idx2)) = (idx1, idx2) else {
            return Err(Error::NotFound("One or both users not found".to_string()));
        };

        let vectors: Vec<FeatureVector> =
            profiles.iter().map(UserFinancialProfile::to_vector).collect();
        let normalized = standardize(&vectors);

        let (raw1, raw2) = (&vectors[idx1], &vectors[idx2]);
        let (norm1, norm2) = (&normalized[idx1], &normalized[idx2]);

        let feature_comparison = FEATURE_NAMES
            .iter()
            .enumerate()
            .map(|(i, &feature)| {
                let raw_difference = (raw1[i] - raw2[i]).abs();
                let avg = (raw1[i] + raw2[i]) / 2.0;
                FeatureComparison {
                    feature,
                    user1: raw1[i],
                    user2: raw2[i],
                    normalized_difference: (norm1[i] - norm2[i]).abs(),
                    raw_difference,
                    percent_difference: if avg != 0.0 {
                        raw_difference / avg * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        let compared = |idx: usize| -> Result<ComparedUser> {
            let profile = profiles[idx].clone();
            Ok(ComparedUser {
                three_month_summary: self.three_month_summary(profile.user_id)?,
                aims_summary: self.aims_summary(profile.user_id)?,
                profile,
            })
        };

        Ok(UserComparison {
            similarity_score: cosine_similarity(norm1, norm2),
            user1: compared(idx1)?,
            user2: compared(idx2)?,
            feature_comparison,
            normalized_vectors: NormalizedVectors {
                user1: norm1.to_vec(),
                user2: norm2.to_vec(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FinancialTransactionType, NewFinancialAim};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_standardize_population_std() {
        let mut a = [0.0; FEATURE_COUNT];
        let mut b = [0.0; FEATURE_COUNT];
        a[0] = 1.0;
        b[0] = 3.0;
        a[1] = 5.0;
        b[1] = 5.0;

        let out = standardize(&[a, b]);
        // mean 2, population std 1
        assert!(close(out[0][0], -1.0));
        assert!(close(out[1][0], 1.0));
        // constant column
        assert_eq!(out[0][1], 0.0);
        assert_eq!(out[1][1], 0.0);
    }

    #[test]
    fn test_standardize_empty() {
        assert!(standardize(&[]).is_empty());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!(close(cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]), 1.0));
        assert!(close(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]), 0.0));
        assert!(close(cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]), -1.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_profile_derivations() {
        let now = Utc::now();
        let profile = UserFinancialProfile::from_stats(
            7,
            &AccountStats {
                total_balance: 100.0,
                num_accounts: 1,
                avg_account_age_days: 10.0,
            },
            &LedgerStats {
                total_transactions: 20,
                total_deposit: 500.0,
                total_withdrawal: 200.0,
                avg_transaction_amount: 35.0,
                first_transaction_at: Some(now - Duration::days(10)),
            },
            &AimStats {
                num_aims: 4,
                total_target_amount: 1000.0,
                total_current_amount: 250.0,
                avg_aim_progress: 30.0,
                num_completed_aims: 1,
            },
            now,
        );

        assert!(close(profile.transaction_frequency, 2.0));
        assert!(close(profile.completion_rate, 25.0));
        assert!(close(profile.savings_rate, 25.0));
        assert!(close(profile.net_flow, 300.0));
        assert_eq!(profile.to_vector()[7], profile.transaction_frequency);
        assert_eq!(profile.to_vector()[15], profile.net_flow);
    }

    #[test]
    fn test_profile_same_day_activity_counts_one_day() {
        let now = Utc::now();
        let profile = UserFinancialProfile::from_stats(
            1,
            &AccountStats::default(),
            &LedgerStats {
                total_transactions: 3,
                first_transaction_at: Some(now - Duration::hours(2)),
                ..Default::default()
            },
            &AimStats::default(),
            now,
        );
        assert!(close(profile.transaction_frequency, 3.0));
        assert_eq!(profile.completion_rate, 0.0);
        assert_eq!(profile.savings_rate, 0.0);
    }

    fn saver(db: &Database, name: &str, balance: f64, deposit: f64) -> i64 {
        let user = db
            .create_user(name, &format!("{}@example.com", name), "hash", balance)
            .unwrap();
        let aim = db
            .create_aim(
                user.id,
                &NewFinancialAim {
                    title: "Goal".into(),
                    description: None,
                    target_amount: 1000.0,
                    current_amount: 0.0,
                },
            )
            .unwrap();
        if deposit > 0.0 {
            db.apply_financial_transaction(
                user.id,
                aim.id,
                deposit,
                FinancialTransactionType::Deposit,
            )
            .unwrap();
        }
        // Same account age for everyone regardless of test timing
        db.conn()
            .unwrap()
            .execute(
                "UPDATE bank_accounts SET created_at = '2026-01-01 00:00:00' WHERE user_id = ?",
                rusqlite::params![user.id],
            )
            .unwrap();
        user.id
    }

    #[test]
    fn test_find_similar_users_ranks_closest_first() {
        let db = Database::in_memory().unwrap();
        let target = saver(&db, "target", 5000.0, 1000.0);
        let twin = saver(&db, "twin", 5000.0, 1000.0);
        let opposite = saver(&db, "opposite", 100.0, 0.0);
        let _near = saver(&db, "near", 4000.0, 800.0);

        let service = SimilarityService::new(&db);
        let ranked = service.find_similar_users(target, DEFAULT_TOP_N).unwrap();

        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|(p, _)| p.user_id != target));
        assert_eq!(ranked[0].0.user_id, twin);
        assert!(ranked[0].1 > 0.99);
        assert_eq!(ranked.last().unwrap().0.user_id, opposite);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));

        let top1 = service.find_similar_users(target, 1).unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[test]
    fn test_find_similar_unknown_or_alone() {
        let db = Database::in_memory().unwrap();
        let service = SimilarityService::new(&db);
        assert!(service.find_similar_users(42, 5).unwrap().is_empty());

        let only = saver(&db, "only", 10.0, 0.0);
        assert!(service.find_similar_users(only, 5).unwrap().is_empty());
    }

    #[test]
    fn test_similar_users_report_includes_summaries() {
        let db = Database::in_memory().unwrap();
        let target = saver(&db, "target", 5000.0, 1000.0);
        let twin = saver(&db, "twin", 5000.0, 1000.0);

        let report = SimilarityService::new(&db)
            .similar_users_report(target, 5)
            .unwrap();
        assert_eq!(report.user_id, target);
        let first = &report.similar_users[0];
        assert_eq!(first.user_id, twin);
        assert_eq!(first.profile_summary.three_month_summary.income, 1000.0);
        assert_eq!(first.profile_summary.aims_summary.total_completed, 1);
        assert_eq!(
            first.profile_summary.aims_summary.completed_aims[0].progress_percent,
            100.0
        );
    }

    #[test]
    fn test_compare_users() {
        let db = Database::in_memory().unwrap();
        let a = saver(&db, "a", 1000.0, 200.0);
        let b = saver(&db, "b", 3000.0, 0.0);
        saver(&db, "c", 2000.0, 100.0);

        let service = SimilarityService::new(&db);
        let cmp = service.compare_users(a, b).unwrap();

        assert_eq!(cmp.feature_comparison.len(), FEATURE_COUNT);
        assert_eq!(cmp.normalized_vectors.user1.len(), FEATURE_COUNT);

        let balance = &cmp.feature_comparison[0];
        assert_eq!(balance.feature, "total_balance");
        assert_eq!(balance.user1, 800.0);
        assert_eq!(balance.user2, 3000.0);
        assert!(close(balance.raw_difference, 2200.0));
        assert!(close(balance.percent_difference, 2200.0 / 1900.0 * 100.0));

        let accounts = &cmp.feature_comparison[1];
        assert_eq!(accounts.normalized_difference, 0.0);
        assert_eq!(accounts.percent_difference, 0.0);

        assert_eq!(cmp.user1.three_month_summary.income, 200.0);
        assert!((-1.0..=1.0).contains(&cmp.similarity_score));

        let err = service.compare_users(a, 999).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_compare_user_with_self() {
        let db = Database::in_memory().unwrap();
        let a = saver(&db, "a", 1000.0, 200.0);
        saver(&db, "b", 3000.0, 0.0);

        let cmp = SimilarityService::new(&db).compare_users(a, a).unwrap();
        assert!(close(cmp.similarity_score, 1.0));
        assert!(cmp
            .feature_comparison
            .iter()
            .all(|f| f.raw_difference == 0.0));
    }

    #[test]
    fn test_profile_unknown_user() {
        let db = Database::in_memory().unwrap();
        let err = SimilarityService::new(&db).profile(5).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
