use super::store_error;
use super::Database;
use crate::models::AbuseReport;
use crate::Result;

impl Database {
    /// Append an abuse report.
    ///
    /// No de-duplication: storing the same report twice yields two rows
    /// unless the table carries a uniqueness constraint, in which case the
    /// second insert fails with `DuplicateItem`.
    ///
    /// # Errors
    /// - `StoreUnavailable` if no pooled connection is available in time
    /// - `DuplicateItem` on a unique violation
    pub async fn insert_abuse_report(&self, report: &AbuseReport) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO spam_reports (
                reporter_did,
                spammer_did,
                message_hash,
                reason,
                reported_at
            )
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&report.reporter_did)
        .bind(&report.spammer_did)
        .bind(&report.message_hash)
        .bind(&report.reason)
        .bind(report.reported_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::info!(
            "Stored spam report: {} by {}",
            report.spammer_did,
            report.reporter_did
        );
        Ok(())
    }

    /// Number of stored reports carrying `message_hash`
    pub async fn count_abuse_reports(&self, message_hash: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM spam_reports WHERE message_hash = $1",
        )
        .bind(message_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(count)
    }
}
