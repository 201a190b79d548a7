use chrono::DateTime;
use chrono::Utc;

use super::store_error;
use super::Database;
use crate::models::TrustScore;
use crate::Result;

impl Database {
    /// Active trust scores updated after `since`, newest first.
    ///
    /// `limit` bounds memory use and the size of the following RPC burst.
    ///
    /// # Errors
    /// - `StoreUnavailable` if no pooled connection is available in time
    /// - Query errors (schema mismatch, type decoding)
    pub async fn get_updated_trust_scores(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TrustScore>> {
        let scores = sqlx::query_as::<_, TrustScore>(
            r"
            SELECT
                agent_did AS did,
                composite_score::float8 AS composite_score,
                pogq_score::float8 AS pogq_score,
                tcdm_score::float8 AS tcdm_score,
                entropy_score::float8 AS entropy_score,
                updated_at
            FROM agent_reputations
            WHERE updated_at > $1
              AND is_active = true
            ORDER BY updated_at DESC
            LIMIT $2
            ",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::debug!("Fetched {} trust scores updated since {}", scores.len(), since);
        Ok(scores)
    }
}
