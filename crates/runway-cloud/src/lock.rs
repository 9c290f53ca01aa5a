//! Per-environment deploy lease stored as a DynamoDB item.
//!
//! The table's partition key must be the string attribute `environment`.
//! A lease carries an `expires_at` epoch so that a holder which crashed
//! without releasing stops blocking deploys once the TTL passes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::client::{AwsClient, args};
use crate::command::CommandError;
use crate::executor::CommandExecutor;

/// Who holds a deploy lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lease.
    pub holder: String,
    /// Process ID of the lease holder.
    pub pid: u32,
    /// When the lease was acquired.
    pub started_at: DateTime<Utc>,
    /// Unix time after which the lease may be taken over.
    pub expires_at: i64,
}

impl LockInfo {
    /// Lease info for the current process.
    pub fn new(ttl_secs: u64) -> Self {
        let started_at = Utc::now();
        let ttl = ttl_secs.min(i64::MAX as u64) as i64;
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at,
            expires_at: started_at.timestamp().saturating_add(ttl),
        }
    }

    fn to_item(&self, environment: &str) -> serde_json::Value {
        json!({
            "environment": { "S": environment },
            "holder": { "S": self.holder },
            "pid": { "N": self.pid.to_string() },
            "started_at": { "S": self.started_at.to_rfc3339() },
            "expires_at": { "N": self.expires_at.to_string() }
        })
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (pid {}) since {}",
            self.holder,
            self.pid,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// A lease held by this process; hand it back to [`AwsClient::release_lease`].
#[derive(Debug, Clone)]
pub struct DeployLease {
    pub table: String,
    pub environment: String,
    pub info: LockInfo,
}

impl<E: CommandExecutor> AwsClient<E> {
    /// Take the lease for `environment`, or report who holds it.
    pub async fn acquire_lease(
        &self,
        table: &str,
        environment: &str,
        ttl_secs: u64,
    ) -> Result<DeployLease, LockError> {
        let info = LockInfo::new(ttl_secs);
        let now = json!({ ":now": { "N": Utc::now().timestamp().to_string() } });

        let result = self
            .aws(args([
                "dynamodb",
                "put-item",
                "--table-name",
                table,
                "--item",
                &info.to_item(environment).to_string(),
                "--condition-expression",
                "attribute_not_exists(#env) OR expires_at < :now",
                "--expression-attribute-names",
                r##"{"#env":"environment"}"##,
                "--expression-attribute-values",
                &now.to_string(),
            ]))
            .await;

        match result {
            Ok(_) => {
                tracing::info!(%table, %environment, "deploy lease acquired");
                Ok(DeployLease {
                    table: table.to_owned(),
                    environment: environment.to_owned(),
                    info,
                })
            }
            Err(e) if e.stderr_contains("ConditionalCheckFailedException") => {
                let holder = self.lease_holder(table, environment).await?;
                Err(LockError::Held {
                    environment: environment.to_owned(),
                    holder,
                })
            }
            Err(e) => Err(LockError::Acquire {
                table: table.to_owned(),
                source: e,
            }),
        }
    }

    /// Delete the lease, but only if this process still owns it.
    pub async fn release_lease(&self, lease: &DeployLease) -> Result<(), LockError> {
        let key = json!({ "environment": { "S": lease.environment } });
        let values = json!({
            ":holder": { "S": lease.info.holder },
            ":pid": { "N": lease.info.pid.to_string() }
        });

        self.aws(args([
            "dynamodb",
            "delete-item",
            "--table-name",
            &lease.table,
            "--key",
            &key.to_string(),
            "--condition-expression",
            "holder = :holder AND pid = :pid",
            "--expression-attribute-values",
            &values.to_string(),
        ]))
        .await
        .map_err(|e| LockError::Release {
            table: lease.table.clone(),
            source: e,
        })?;

        tracing::info!(environment = %lease.environment, "deploy lease released");
        Ok(())
    }

    /// Read back the current lease holder; `None` if the item vanished.
    async fn lease_holder(
        &self,
        table: &str,
        environment: &str,
    ) -> Result<Option<LockInfo>, LockError> {
        let key = json!({ "environment": { "S": environment } });
        let output = self
            .aws(args([
                "dynamodb",
                "get-item",
                "--table-name",
                table,
                "--key",
                &key.to_string(),
                "--consistent-read",
                "--output",
                "json",
            ]))
            .await
            .map_err(|e| LockError::Acquire {
                table: table.to_owned(),
                source: e,
            })?;

        // get-item prints nothing at all when the item is missing
        if output.trim().is_empty() {
            return Ok(None);
        }

        let parsed: GetItemOutput =
            serde_json::from_str(&output).map_err(|e| LockError::InvalidItem { source: e })?;

        parsed.item.map(LeaseItem::into_info).transpose()
    }
}

// ── DynamoDB wire shapes ──

#[derive(Deserialize)]
struct GetItemOutput {
    #[serde(rename = "Item")]
    item: Option<LeaseItem>,
}

#[derive(Deserialize)]
struct LeaseItem {
    holder: StringAttr,
    pid: NumberAttr,
    started_at: StringAttr,
    expires_at: NumberAttr,
}

#[derive(Deserialize)]
struct StringAttr {
    #[serde(rename = "S")]
    s: String,
}

#[derive(Deserialize)]
struct NumberAttr {
    #[serde(rename = "N")]
    n: String,
}

impl LeaseItem {
    fn into_info(self) -> Result<LockInfo, LockError> {
        Ok(LockInfo {
            holder: self.holder.s,
            pid: self
                .pid
                .n
                .parse()
                .map_err(|e| LockError::InvalidNumber { field: "pid", source: e })?,
            started_at: DateTime::parse_from_rfc3339(&self.started_at.s)
                .map_err(|e| LockError::InvalidTimestamp { source: e })?
                .with_timezone(&Utc),
            expires_at: self
                .expires_at
                .n
                .parse()
                .map_err(|e| LockError::InvalidNumber { field: "expires_at", source: e })?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("environment {environment} is being deployed by {}", describe_holder(.holder))]
    Held {
        environment: String,
        holder: Option<LockInfo>,
    },

    #[error("failed to acquire deploy lease in table {table}")]
    Acquire { table: String, source: CommandError },

    #[error("failed to release deploy lease in table {table}")]
    Release { table: String, source: CommandError },

    #[error("unexpected lease item shape")]
    InvalidItem { source: serde_json::Error },

    #[error("lease item has an invalid {field} attribute")]
    InvalidNumber {
        field: &'static str,
        source: std::num::ParseIntError,
    },

    #[error("lease item has an invalid started_at attribute")]
    InvalidTimestamp { source: chrono::ParseError },
}

fn describe_holder(holder: &Option<LockInfo>) -> String {
    holder
        .as_ref()
        .map_or_else(|| "another process".to_owned(), ToString::to_string)
}
