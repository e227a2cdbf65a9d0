use std::sync::Arc;

use sea_orm::{ColumnTrait, ConnectOptions, Database, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::crypto;
use crate::entity::school_db_metadata;

use super::registry::ConnectionRegistry;
use super::server::{DatabaseServer, Engine};
use super::{DbKey, TenancyError};

/// Resolved (decrypted) connection parameters for one tenant database.
#[derive(Clone, Debug)]
pub struct ConnectionSpec {
    pub db_key: DbKey,
    pub engine: Engine,
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl ConnectionSpec {
    /// Build a spec from a connection record by decrypting its password with the master key.
    pub fn from_record(
        record: &school_db_metadata::Model,
        engine: Engine,
        master_key: &[u8; 32],
    ) -> Result<Self, TenancyError> {
        let password = crypto::decrypt_secret(&record.db_password, master_key)?;
        let port = u16::try_from(record.db_port).map_err(|_| {
            TenancyError::Validation(format!(
                "Invalid port {} for {}",
                record.db_port, record.db_name
            ))
        })?;
        Ok(Self {
            db_key: DbKey::new(&record.db_name),
            engine,
            name: record.db_name.clone(),
            user: record.db_user.clone(),
            password,
            host: record.db_host.clone(),
            port,
        })
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<DbKey>,
    pub already_registered: Vec<DbKey>,
    pub failed: Vec<FailedLoad>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedLoad {
    pub db_key: DbKey,
    pub error: String,
}

/// Opens connections to tenant databases and adds them to the registry.
pub struct ConnectionLoader {
    registry: Arc<ConnectionRegistry>,
    server: Arc<dyn DatabaseServer>,
    master_key: [u8; 32],
    bulk_load: OnceCell<LoadReport>,
}

impl ConnectionLoader {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        server: Arc<dyn DatabaseServer>,
        master_key: [u8; 32],
    ) -> Self {
        Self {
            registry,
            server,
            master_key,
            bulk_load: OnceCell::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn server(&self) -> &Arc<dyn DatabaseServer> {
        &self.server
    }

    pub fn master_key(&self) -> &[u8; 32] {
        &self.master_key
    }

    /// Register one tenant database. Returns `Ok(false)` without opening a
    /// connection if the key is already registered.
    pub async fn register(&self, spec: &ConnectionSpec) -> Result<bool, TenancyError> {
        if self.registry.contains(&spec.db_key) {
            tracing::debug!(db = %spec.db_key, "tenant database already registered");
            return Ok(false);
        }

        let url = self.server.connection_url(spec);
        let mut opts = ConnectOptions::new(url.clone());
        if url.contains(":memory:") {
            // every pooled connection to :memory: would be a separate database
            opts.max_connections(1).min_connections(1);
        }
        let conn = Database::connect(opts).await?;

        let inserted = self.registry.insert(spec.db_key.clone(), conn);
        if inserted {
            tracing::info!(
                db = %spec.db_key,
                engine = spec.engine.as_str(),
                host = %spec.host,
                "registered tenant database"
            );
        } else {
            tracing::debug!(db = %spec.db_key, "lost registration race; keeping existing connection");
        }
        Ok(inserted)
    }

    /// Register the database of one fully provisioned record and mark it
    /// ready. Returns `Ok(false)` if it was already registered. Used by the
    /// bulk load and to pick up tenants provisioned after it ran, possibly by
    /// another process.
    pub async fn load_record(
        &self,
        record: &school_db_metadata::Model,
    ) -> Result<bool, TenancyError> {
        let key = DbKey::new(&record.db_name);
        if !record.is_active || !record.provisioning_complete {
            return Err(TenancyError::TenantNotReady(key));
        }
        let spec = ConnectionSpec::from_record(record, self.server.engine(), &self.master_key)?;
        let inserted = self.register(&spec).await?;
        self.registry.mark_ready(&key);
        Ok(inserted)
    }

    /// Register every active, fully provisioned tenant. A tenant that fails to
    /// load is logged and reported; the rest still load.
    pub async fn load_all_known_tenants(&self) -> Result<LoadReport, TenancyError> {
        let records = school_db_metadata::Entity::find()
            .filter(school_db_metadata::Column::IsActive.eq(true))
            .filter(school_db_metadata::Column::ProvisioningComplete.eq(true))
            .order_by_asc(school_db_metadata::Column::Id)
            .all(self.registry.control())
            .await?;

        let mut report = LoadReport::default();
        for record in records {
            let key = DbKey::new(&record.db_name);
            match self.load_record(&record).await {
                Ok(true) => report.loaded.push(key),
                Ok(false) => report.already_registered.push(key),
                Err(e) => {
                    tracing::error!(
                        db = %key,
                        school_id = record.school_id,
                        error = %e,
                        "failed to load tenant database"
                    );
                    report.failed.push(FailedLoad {
                        db_key: key,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            loaded = report.loaded.len(),
            already_registered = report.already_registered.len(),
            failed = report.failed.len(),
            "tenant databases loaded"
        );
        Ok(report)
    }

    /// Run the bulk load exactly once. Concurrent callers wait for the first
    /// one to finish; if it fails the next caller retries.
    pub async fn ensure_loaded(&self) -> Result<&LoadReport, TenancyError> {
        self.bulk_load
            .get_or_try_init(|| self.load_all_known_tenants())
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.bulk_load.initialized()
    }
}
