//! Per-school database isolation.
//!
//! Every school gets its own physical database. The pieces here decide which
//! database an operation runs against ([`router`]), keep live connections to
//! every known tenant ([`registry`], [`loader`]), carry the active tenant
//! through a request ([`context`]), and create new tenant databases
//! ([`provisioner`], [`replicator`]).

use std::fmt;

use sea_orm::DbErr;
use serde::Serialize;

use crate::crypto::CryptoError;

pub mod context;
pub mod loader;
pub mod provisioner;
pub mod registry;
pub mod replicator;
pub mod router;
pub mod server;

pub use context::{active_tenant, scope, set_active_tenant, with_tenant};
pub use loader::{ConnectionLoader, ConnectionSpec, LoadReport};
pub use provisioner::{
    MigrationReport, NewSchool, NewSchoolAdmin, ProvisionPhase, ProvisionedSchool, SchoolEdit,
    TenantCredentials, TenantProvisioner,
};
pub use registry::ConnectionRegistry;
pub use replicator::ReferenceDataReplicator;
pub use router::{DatabaseRouter, EntityKind, Plane, RoutedEntity};
pub use server::{DatabaseServer, Engine, PostgresServer, SqliteServer};

// ---------- db key ----------

/// Name of a physical database in the connection registry.
///
/// Tenant keys are the tenant's `db_name`; the control plane is `default`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DbKey(String);

pub const CONTROL_PLANE: &str = "default";

impl DbKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn control() -> Self {
        Self(CONTROL_PLANE.to_string())
    }

    pub fn is_control(&self) -> bool {
        self.0 == CONTROL_PLANE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DbKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------- error type ----------

#[derive(Debug)]
pub enum TenancyError {
    NotFound(String),
    Conflict(String),
    Validation(String),
    ProvisioningFailed {
        school_id: i32,
        db_name: String,
        phase: ProvisionPhase,
        reason: String,
    },
    RoutingMisconfigured(String),
    ReplicationFailed(String),
    TenantNotReady(DbKey),
    /// `set_active_tenant` was called outside a [`context::scope`].
    NoTenantScope,
    Database(DbErr),
    Crypto(CryptoError),
}

impl fmt::Display for TenancyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenancyError::NotFound(what) => write!(f, "{what} not found"),
            TenancyError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            TenancyError::Validation(msg) => write!(f, "{msg}"),
            TenancyError::ProvisioningFailed {
                school_id,
                db_name,
                phase,
                reason,
            } => write!(
                f,
                "Provisioning of school {school_id} ({db_name}) failed during {}: {reason}",
                phase.as_str()
            ),
            TenancyError::RoutingMisconfigured(msg) => write!(f, "Routing misconfigured: {msg}"),
            TenancyError::ReplicationFailed(msg) => write!(f, "Catalog replication failed: {msg}"),
            TenancyError::TenantNotReady(key) => {
                write!(f, "Tenant database {key} is not ready")
            }
            TenancyError::NoTenantScope => {
                write!(f, "No tenant scope is active for this task")
            }
            TenancyError::Database(e) => write!(f, "Database error: {e}"),
            TenancyError::Crypto(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TenancyError {}

impl From<DbErr> for TenancyError {
    fn from(e: DbErr) -> Self {
        TenancyError::Database(e)
    }
}

impl From<CryptoError> for TenancyError {
    fn from(e: CryptoError) -> Self {
        TenancyError::Crypto(e)
    }
}

/// SQLite and Postgres both mention "unique" in constraint-violation messages.
pub fn is_unique_violation(e: &DbErr) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE") || msg.contains("unique")
}
