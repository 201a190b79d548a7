use tracing::info;
use tracing::warn;

use super::store_error;
use super::Database;
use crate::models::parse_did;
use crate::models::IdentityRecord;
use crate::models::NewIdentity;
use crate::Result;
use crate::TrustSyncError;

impl Database {
    /// Resolve an active DID to its agent key.
    ///
    /// Each attempt is written to `did_resolution_log`, and a hit refreshes
    /// `last_seen`. Both side writes are best-effort and never fail the read.
    pub async fn resolve_identity(
        &self,
        did: &str,
        request_source: &str,
    ) -> Result<Option<IdentityRecord>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r"
            SELECT did, agent_pubkey, display_name, last_seen
            FROM did_registry
            WHERE did = $1 AND is_active = true
            ",
        )
        .bind(did)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        self.log_resolution(did, record.as_ref(), request_source)
            .await;
        if record.is_some() {
            self.touch_last_seen(did).await;
        }
        Ok(record)
    }

    async fn log_resolution(&self, did: &str, record: Option<&IdentityRecord>, source: &str) {
        let result = sqlx::query(
            r"
            INSERT INTO did_resolution_log (did, resolved_pubkey, success, request_source)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(did)
        .bind(record.map(|r| r.agent_pubkey.as_str()))
        .bind(record.is_some())
        .bind(source)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("Failed to log resolution of {}: {}", did, e);
        }
    }

    /// Refresh `last_seen` for a DID. Failures are logged and swallowed.
    pub async fn touch_last_seen(&self, did: &str) {
        let result = sqlx::query("UPDATE did_registry SET last_seen = NOW() WHERE did = $1")
            .bind(did)
            .execute(&self.pool)
            .await;

        if let Err(e) = result {
            warn!("Failed to update last_seen for {}: {}", did, e);
        }
    }

    /// Register a new DID mapping. Returns `false` if the DID already exists.
    pub async fn register_identity(&self, identity: &NewIdentity) -> Result<bool> {
        let parts = parse_did(&identity.did)?;

        let result = sqlx::query(
            r"
            INSERT INTO did_registry (
                did, agent_pubkey, did_method, did_method_specific_id, display_name, email_alias
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&identity.did)
        .bind(&identity.agent_pubkey)
        .bind(parts.method)
        .bind(parts.identifier)
        .bind(&identity.display_name)
        .bind(&identity.email_alias)
        .execute(&self.pool)
        .await
        .map_err(store_error);

        match result {
            Ok(_) => {
                info!("Registered new DID: {}", identity.did);
                Ok(true)
            }
            Err(TrustSyncError::DuplicateItem(_)) => {
                warn!("DID already exists: {}", identity.did);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Point an active DID at a new agent key. Returns `false` if no active row matched.
    pub async fn update_identity_key(
        &self,
        did: &str,
        new_agent_pubkey: &str,
        reason: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE did_registry SET agent_pubkey = $2 WHERE did = $1 AND is_active = true",
        )
        .bind(did)
        .bind(new_agent_pubkey)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        info!("Updated DID: {} (reason: {})", did, reason);
        Ok(true)
    }
}
