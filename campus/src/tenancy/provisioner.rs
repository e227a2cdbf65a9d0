//! Creates a school and its isolated database.
//!
//! Provisioning runs in phases. The control-plane rows (admin user, school,
//! board mappings, connection record) are written in one transaction, so a
//! failure there leaves nothing behind. Everything after that touches a
//! second database and cannot share the transaction; instead the connection
//! record carries `provisioning_complete`, which stays false until the tenant
//! is migrated and seeded. An incomplete tenant is never marked ready, and
//! [`TenantProvisioner::resume`] re-runs the remaining phases.

use std::sync::{Arc, OnceLock};

use chrono::{Datelike, Utc};
use dashmap::DashSet;
use migration::{MigratorTrait, TenantMigrator};
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Auth, AuthError, NewUser};
use crate::collaborators::{Notification, NotificationKind, Notifier};
use crate::crypto;
use crate::entity::{academic_year, app_user, board, school, school_board_mapping, school_db_metadata};

use super::loader::{ConnectionLoader, ConnectionSpec};
use super::replicator::ReferenceDataReplicator;
use super::router::{DatabaseRouter, EntityKind};
use super::server::validate_db_name;
use super::{DbKey, TenancyError, is_unique_violation};

const MAX_DB_NAME: usize = 63;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPhase {
    Record,
    CreateDatabase,
    Register,
    Migrate,
    SeedAcademicYear,
    Finalize,
    Notify,
    Replicate,
}

impl ProvisionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionPhase::Record => "record",
            ProvisionPhase::CreateDatabase => "create_database",
            ProvisionPhase::Register => "register",
            ProvisionPhase::Migrate => "migrate",
            ProvisionPhase::SeedAcademicYear => "seed_academic_year",
            ProvisionPhase::Finalize => "finalize",
            ProvisionPhase::Notify => "notify",
            ProvisionPhase::Replicate => "replicate",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewSchoolAdmin {
    pub user_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewSchool {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub board_ids: Vec<i32>,
    pub admin: NewSchoolAdmin,
    #[serde(default)]
    pub academic_start_year: Option<i32>,
    #[serde(default)]
    pub academic_end_year: Option<i32>,
}

/// Fields to change on an existing school. `None` keeps the current value;
/// `board_ids` replaces the whole board mapping.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SchoolEdit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub board_ids: Option<Vec<i32>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProvisionedSchool {
    pub school_id: i32,
    pub admin_user_id: Option<Uuid>,
    pub db_name: String,
    pub academic_year_id: i32,
    pub catalog_replicated: bool,
}

/// Credentials written into every new connection record.
#[derive(Clone, Debug)]
pub struct TenantCredentials {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct MigrationReport {
    pub succeeded: Vec<DbKey>,
    pub failed: Vec<FailedTenant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedTenant {
    pub db_key: DbKey,
    pub error: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileReport {
    pub resumed: Vec<ProvisionedSchool>,
    pub failed: Vec<FailedTenant>,
}

/// Progress callback: phase plus a human-readable line.
pub type Progress<'a> = &'a (dyn Fn(ProvisionPhase, &str) + Send + Sync);

fn no_progress(_: ProvisionPhase, _: &str) {}

fn slug_re() -> &'static Regex {
    static SLUG_RE: OnceLock<Regex> = OnceLock::new();
    SLUG_RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// `{slug}_{school_id}_db`, where the slug is the lowercased name with every
/// run of other characters collapsed to `_`. The id keeps equal slugs apart.
pub fn derive_db_name(school_name: &str, school_id: i32) -> String {
    let lower = school_name.to_lowercase();
    let collapsed = slug_re().replace_all(&lower, "_");
    let mut slug = collapsed.trim_matches('_').to_string();
    if slug.is_empty() {
        slug = "school".to_string();
    }
    let suffix = format!("_{school_id}_db");
    let room = MAX_DB_NAME.saturating_sub(suffix.len());
    if slug.len() > room {
        slug.truncate(room);
        slug = slug.trim_end_matches('_').to_string();
    }
    format!("{slug}{suffix}")
}

impl From<AuthError> for TenancyError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::WeakPassword => TenancyError::Validation(e.to_string()),
            AuthError::UnknownRole(role) => TenancyError::NotFound(format!("Role '{role}'")),
            AuthError::Conflict(msg) => TenancyError::Conflict(msg),
            AuthError::Db(e) => TenancyError::Database(e),
            other => TenancyError::Validation(other.to_string()),
        }
    }
}

fn failed(record: &school_db_metadata::Model, phase: ProvisionPhase, e: TenancyError) -> TenancyError {
    tracing::error!(
        school_id = record.school_id,
        db = %record.db_name,
        phase = phase.as_str(),
        error = %e,
        "tenant provisioning failed"
    );
    TenancyError::ProvisioningFailed {
        school_id: record.school_id,
        db_name: record.db_name.clone(),
        phase,
        reason: e.to_string(),
    }
}

pub struct TenantProvisioner {
    loader: Arc<ConnectionLoader>,
    router: DatabaseRouter,
    replicator: ReferenceDataReplicator,
    notifier: Arc<dyn Notifier>,
    credentials: TenantCredentials,
    /// School ids with a `resume` in flight.
    resuming: DashSet<i32>,
}

/// Holds a school's slot in `resuming` until dropped.
struct ResumeGuard<'a> {
    resuming: &'a DashSet<i32>,
    school_id: i32,
}

impl Drop for ResumeGuard<'_> {
    fn drop(&mut self) {
        self.resuming.remove(&self.school_id);
    }
}

impl TenantProvisioner {
    pub fn new(
        loader: Arc<ConnectionLoader>,
        notifier: Arc<dyn Notifier>,
        credentials: TenantCredentials,
    ) -> Self {
        let registry = loader.registry().clone();
        Self {
            router: DatabaseRouter::new(registry.clone()),
            replicator: ReferenceDataReplicator::new(registry),
            loader,
            notifier,
            credentials,
            resuming: DashSet::new(),
        }
    }

    pub fn router(&self) -> &DatabaseRouter {
        &self.router
    }

    pub fn replicator(&self) -> &ReferenceDataReplicator {
        &self.replicator
    }

    pub async fn provision(&self, new: NewSchool) -> Result<ProvisionedSchool, TenancyError> {
        self.provision_with_progress(new, &no_progress).await
    }

    pub async fn provision_with_progress(
        &self,
        new: NewSchool,
        progress: Progress<'_>,
    ) -> Result<ProvisionedSchool, TenancyError> {
        progress(ProvisionPhase::Record, "Creating school records");
        let control = self.loader.registry().control();
        let txn = control.begin().await?;
        let (school, admin, record) = match self.create_records(&txn, &new).await {
            Ok(rows) => {
                txn.commit().await?;
                rows
            }
            Err(e) => {
                txn.rollback().await?;
                tracing::warn!(school = %new.name, error = %e, "school registration rejected");
                return Err(e);
            }
        };
        tracing::info!(
            school_id = school.id,
            db = %record.db_name,
            "school registered; provisioning tenant database"
        );

        let span = match (new.academic_start_year, new.academic_end_year) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        };
        let academic_year_id = self.finish(&record, span, progress).await?;
        self.announce(&school, &admin, progress).await;
        let catalog_replicated = self
            .replicate(&record, academic_year_id, progress)
            .await;

        Ok(ProvisionedSchool {
            school_id: school.id,
            admin_user_id: Some(admin.id),
            db_name: record.db_name,
            academic_year_id,
            catalog_replicated,
        })
    }

    async fn create_records(
        &self,
        txn: &DatabaseTransaction,
        new: &NewSchool,
    ) -> Result<(school::Model, app_user::Model, school_db_metadata::Model), TenancyError> {
        let admin = Auth::create_user(
            txn,
            &NewUser {
                user_name: new.admin.user_name.clone(),
                email: new.admin.email.clone(),
                password: new.admin.password.clone(),
                role: "admin",
                school_id: None,
                is_superuser: false,
                first_name: new.admin.first_name.clone(),
                last_name: new.admin.last_name.clone(),
                phone_number: new.admin.phone_number.clone(),
            },
        )
        .await?;

        let now = Utc::now().naive_utc();
        let school = school::ActiveModel {
            name: Set(new.name.clone()),
            address: Set(new.address.clone()),
            contact_number: Set(new.contact_number.clone()),
            email: Set(new.email.clone()),
            school_admin_id: Set(Some(admin.id)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                TenancyError::Conflict("A school with this email already exists.".to_string())
            } else {
                TenancyError::Database(e)
            }
        })?;

        let boards = if new.board_ids.is_empty() {
            Vec::new()
        } else {
            board::Entity::find()
                .filter(board::Column::Id.is_in(new.board_ids.clone()))
                .filter(board::Column::IsActive.eq(true))
                .order_by_asc(board::Column::Id)
                .all(txn)
                .await?
        };
        if boards.is_empty() {
            return Err(TenancyError::Validation(
                "At least one valid board must be selected.".to_string(),
            ));
        }
        for b in &boards {
            school_board_mapping::ActiveModel {
                school_id: Set(school.id),
                board_id: Set(b.id),
                ..Default::default()
            }
            .insert(txn)
            .await?;
        }

        let mut admin_update: app_user::ActiveModel = admin.into();
        admin_update.school_id = Set(Some(school.id));
        admin_update.updated_at = Set(now);
        let admin = admin_update.update(txn).await?;

        let db_name = derive_db_name(&school.name, school.id);
        validate_db_name(&db_name)?;
        let cipher = crypto::encrypt_secret(&self.credentials.password, self.loader.master_key())?;
        let record = school_db_metadata::ActiveModel {
            school_id: Set(school.id),
            db_name: Set(db_name.clone()),
            db_user: Set(self.credentials.user.clone()),
            db_password: Set(cipher),
            db_host: Set(self.credentials.host.clone()),
            db_port: Set(i32::from(self.credentials.port)),
            is_active: Set(true),
            provisioning_complete: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                TenancyError::Conflict(format!("Tenant database {db_name} is already registered"))
            } else {
                TenancyError::Database(e)
            }
        })?;

        Ok((school, admin, record))
    }

    /// Create, register, migrate and seed the tenant database, then mark the
    /// record complete. Every step tolerates having run before.
    async fn finish(
        &self,
        record: &school_db_metadata::Model,
        span: Option<(i32, i32)>,
        progress: Progress<'_>,
    ) -> Result<i32, TenancyError> {
        let key = DbKey::new(&record.db_name);
        let server = self.loader.server();

        progress(
            ProvisionPhase::CreateDatabase,
            &format!("Creating database {key}"),
        );
        let exists = server
            .database_exists(&record.db_name)
            .await
            .map_err(|e| failed(record, ProvisionPhase::CreateDatabase, e))?;
        if exists {
            tracing::info!(db = %key, "tenant database already exists; reusing it");
        } else {
            match server.create_database(&record.db_name).await {
                Ok(()) | Err(TenancyError::Conflict(_)) => {}
                Err(e) => return Err(failed(record, ProvisionPhase::CreateDatabase, e)),
            }
        }

        progress(ProvisionPhase::Register, &format!("Registering {key}"));
        let spec = ConnectionSpec::from_record(record, server.engine(), self.loader.master_key())
            .map_err(|e| failed(record, ProvisionPhase::Register, e))?;
        self.loader
            .register(&spec)
            .await
            .map_err(|e| failed(record, ProvisionPhase::Register, e))?;
        let conn = self
            .loader
            .registry()
            .get(&key)
            .ok_or_else(|| {
                failed(
                    record,
                    ProvisionPhase::Register,
                    TenancyError::NotFound(format!("Tenant database {key}")),
                )
            })?;

        progress(ProvisionPhase::Migrate, "Applying tenant schema");
        if let Some(kind) = EntityKind::TENANT
            .iter()
            .find(|k| !self.router.allow_migrate(&key, **k))
        {
            return Err(failed(
                record,
                ProvisionPhase::Migrate,
                TenancyError::RoutingMisconfigured(format!(
                    "{} may not be migrated onto {key}",
                    kind.as_str()
                )),
            ));
        }
        TenantMigrator::up(&conn, None)
            .await
            .map_err(|e| failed(record, ProvisionPhase::Migrate, e.into()))?;

        progress(ProvisionPhase::SeedAcademicYear, "Seeding academic year");
        let academic_year_id = seed_academic_year(&conn, span)
            .await
            .map_err(|e| failed(record, ProvisionPhase::SeedAcademicYear, e.into()))?;

        progress(ProvisionPhase::Finalize, "Marking tenant ready");
        let mut done: school_db_metadata::ActiveModel = record.clone().into();
        done.provisioning_complete = Set(true);
        done.updated_at = Set(Utc::now().naive_utc());
        done.update(self.loader.registry().control())
            .await
            .map_err(|e| failed(record, ProvisionPhase::Finalize, e.into()))?;
        self.loader.registry().mark_ready(&key);

        tracing::info!(
            school_id = record.school_id,
            db = %key,
            academic_year_id,
            "tenant database provisioned"
        );
        Ok(academic_year_id)
    }

    async fn announce(&self, school: &school::Model, admin: &app_user::Model, progress: Progress<'_>) {
        progress(ProvisionPhase::Notify, "Sending welcome email");
        let notification = Notification {
            kind: NotificationKind::Welcome,
            to: admin.email.clone(),
            user_name: admin.user_name.clone(),
            school_name: Some(school.name.clone()),
            otp: None,
        };
        if let Err(e) = self.notifier.send(&notification).await {
            tracing::warn!(school_id = school.id, to = %admin.email, error = %e, "welcome notification failed");
        }
    }

    async fn replicate(
        &self,
        record: &school_db_metadata::Model,
        academic_year_id: i32,
        progress: Progress<'_>,
    ) -> bool {
        progress(ProvisionPhase::Replicate, "Copying syllabus catalog");
        self.replicator
            .replicate(&DbKey::new(&record.db_name), record.school_id, academic_year_id)
            .await
    }

    /// Re-run the tenant-side phases for a school whose provisioning stopped
    /// part way.
    pub async fn resume(&self, school_id: i32) -> Result<ProvisionedSchool, TenancyError> {
        if !self.resuming.insert(school_id) {
            return Err(TenancyError::Conflict(format!(
                "Provisioning for school {school_id} is already running"
            )));
        }
        let _guard = ResumeGuard {
            resuming: &self.resuming,
            school_id,
        };

        let control = self.loader.registry().control();
        let school = school::Entity::find_by_id(school_id)
            .one(control)
            .await?
            .ok_or_else(|| TenancyError::NotFound(format!("School {school_id}")))?;
        let record = school_db_metadata::Entity::find()
            .filter(school_db_metadata::Column::SchoolId.eq(school_id))
            .one(control)
            .await?
            .ok_or_else(|| TenancyError::NotFound(format!("Database record for school {school_id}")))?;

        if !record.is_active {
            return Err(TenancyError::Validation(format!(
                "School {school_id} has been deactivated"
            )));
        }
        if record.provisioning_complete {
            return Err(TenancyError::Conflict(format!(
                "School {school_id} is already provisioned"
            )));
        }

        tracing::info!(school_id, db = %record.db_name, "resuming tenant provisioning");
        let academic_year_id = self.finish(&record, None, &no_progress).await?;

        let admin = match school.school_admin_id {
            Some(id) => app_user::Entity::find_by_id(id).one(control).await?,
            None => None,
        };
        if let Some(admin) = &admin {
            self.announce(&school, admin, &no_progress).await;
        }
        let catalog_replicated = self.replicate(&record, academic_year_id, &no_progress).await;

        Ok(ProvisionedSchool {
            school_id,
            admin_user_id: school.school_admin_id,
            db_name: record.db_name,
            academic_year_id,
            catalog_replicated,
        })
    }

    /// Resume every active record still marked incomplete.
    pub async fn reconcile_incomplete(&self) -> Result<ReconcileReport, TenancyError> {
        let pending = school_db_metadata::Entity::find()
            .filter(school_db_metadata::Column::IsActive.eq(true))
            .filter(school_db_metadata::Column::ProvisioningComplete.eq(false))
            .order_by_asc(school_db_metadata::Column::SchoolId)
            .all(self.loader.registry().control())
            .await?;

        let mut report = ReconcileReport::default();
        for record in pending {
            match self.resume(record.school_id).await {
                Ok(done) => report.resumed.push(done),
                Err(e) => report.failed.push(FailedTenant {
                    db_key: DbKey::new(&record.db_name),
                    error: e.to_string(),
                }),
            }
        }
        tracing::info!(
            resumed = report.resumed.len(),
            failed = report.failed.len(),
            "reconciled incomplete tenants"
        );
        Ok(report)
    }

    /// Update a school's details and, when `board_ids` is given, remap its
    /// boards, all in one control-plane transaction. The tenant database
    /// and its replicated catalog are untouched.
    pub async fn edit_school(
        &self,
        school_id: i32,
        edit: SchoolEdit,
    ) -> Result<school::Model, TenancyError> {
        let txn = self.loader.registry().control().begin().await?;
        let current = school::Entity::find_by_id(school_id)
            .one(&txn)
            .await?
            .ok_or_else(|| TenancyError::NotFound(format!("School {school_id}")))?;

        let mut s: school::ActiveModel = current.into();
        if let Some(name) = edit.name {
            if name.trim().is_empty() {
                return Err(TenancyError::Validation("School name is required.".to_string()));
            }
            s.name = Set(name);
        }
        if let Some(address) = edit.address {
            s.address = Set(address);
        }
        if let Some(contact) = edit.contact_number {
            s.contact_number = Set(Some(contact));
        }
        if let Some(email) = edit.email {
            s.email = Set(Some(email));
        }
        s.updated_at = Set(Utc::now().naive_utc());
        let updated = s.update(&txn).await.map_err(|e| {
            if is_unique_violation(&e) {
                TenancyError::Conflict("A school with this email already exists.".to_string())
            } else {
                TenancyError::Database(e)
            }
        })?;

        if let Some(board_ids) = edit.board_ids {
            let boards = board::Entity::find()
                .filter(board::Column::Id.is_in(board_ids))
                .filter(board::Column::IsActive.eq(true))
                .all(&txn)
                .await?;
            if boards.is_empty() {
                return Err(TenancyError::Validation(
                    "At least one valid board must be selected.".to_string(),
                ));
            }
            let keep: Vec<i32> = boards.iter().map(|b| b.id).collect();
            school_board_mapping::Entity::delete_many()
                .filter(school_board_mapping::Column::SchoolId.eq(school_id))
                .filter(school_board_mapping::Column::BoardId.is_not_in(keep.clone()))
                .exec(&txn)
                .await?;
            let existing: Vec<i32> = school_board_mapping::Entity::find()
                .filter(school_board_mapping::Column::SchoolId.eq(school_id))
                .all(&txn)
                .await?
                .into_iter()
                .map(|m| m.board_id)
                .collect();
            for board_id in keep.into_iter().filter(|id| !existing.contains(id)) {
                school_board_mapping::ActiveModel {
                    school_id: Set(school_id),
                    board_id: Set(board_id),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }
        txn.commit().await?;
        tracing::info!(school_id, "school updated");
        Ok(updated)
    }

    /// Mark the school and its record inactive and drop the live connection.
    /// The physical database is left in place.
    pub async fn deactivate(&self, school_id: i32) -> Result<(), TenancyError> {
        let control = self.loader.registry().control();
        let txn = control.begin().await?;
        let record = school_db_metadata::Entity::find()
            .filter(school_db_metadata::Column::SchoolId.eq(school_id))
            .one(&txn)
            .await?
            .ok_or_else(|| TenancyError::NotFound(format!("Database record for school {school_id}")))?;
        let school = school::Entity::find_by_id(school_id)
            .one(&txn)
            .await?
            .ok_or_else(|| TenancyError::NotFound(format!("School {school_id}")))?;

        let now = Utc::now().naive_utc();
        let mut r: school_db_metadata::ActiveModel = record.clone().into();
        r.is_active = Set(false);
        r.updated_at = Set(now);
        r.update(&txn).await?;
        let mut s: school::ActiveModel = school.into();
        s.is_active = Set(false);
        s.updated_at = Set(now);
        s.update(&txn).await?;
        txn.commit().await?;

        let key = DbKey::new(&record.db_name);
        self.loader.registry().remove(&key);
        tracing::info!(school_id, db = %key, "school deactivated");
        Ok(())
    }

    /// Apply pending tenant migrations to every active, fully provisioned
    /// tenant. Tenants missing from the registry are loaded first; one that
    /// cannot be loaded or migrated is reported and the rest continue.
    pub async fn migrate_all_tenants(&self) -> Result<MigrationReport, TenancyError> {
        let registry = self.loader.registry();
        let records = school_db_metadata::Entity::find()
            .filter(school_db_metadata::Column::IsActive.eq(true))
            .filter(school_db_metadata::Column::ProvisioningComplete.eq(true))
            .order_by_asc(school_db_metadata::Column::DbName)
            .all(registry.control())
            .await?;

        let mut report = MigrationReport::default();
        for record in records {
            let key = DbKey::new(&record.db_name);
            let migrated = match self.loader.load_record(&record).await {
                Ok(_) => match registry.get_ready(&key) {
                    Some(conn) => TenantMigrator::up(&conn, None).await.map_err(TenancyError::from),
                    None => Err(TenancyError::NotFound(format!("Tenant database {key}"))),
                },
                Err(e) => Err(e),
            };
            match migrated {
                Ok(()) => {
                    tracing::info!(db = %key, "tenant migrations applied");
                    report.succeeded.push(key);
                }
                Err(e) => {
                    tracing::error!(db = %key, error = %e, "tenant migration failed");
                    report.failed.push(FailedTenant {
                        db_key: key,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

async fn seed_academic_year(
    conn: &sea_orm::DatabaseConnection,
    span: Option<(i32, i32)>,
) -> Result<i32, DbErr> {
    if let Some(existing) = academic_year::Entity::find()
        .order_by_asc(academic_year::Column::Id)
        .one(conn)
        .await?
    {
        return Ok(existing.id);
    }
    let (start, end) = span.unwrap_or_else(|| {
        let year = Utc::now().year();
        (year, year + 1)
    });
    let year = academic_year::ActiveModel {
        start_year: Set(Some(start)),
        end_year: Set(Some(end)),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(year.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollaboratorError, TracingNotifier};
    use crate::tenancy::registry::ConnectionRegistry;
    use crate::tenancy::server::{DatabaseServer, Engine, SqliteServer};
    use async_trait::async_trait;
    use migration::Migrator;
    use sea_orm::{Database, DatabaseConnection, PaginatorTrait};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    const KEY: [u8; 32] = [9u8; 32];

    /// Sqlite in memory, but `create_database` can be told to fail.
    struct FlakyServer {
        inner: SqliteServer,
        fail_create: AtomicBool,
    }

    #[async_trait]
    impl DatabaseServer for FlakyServer {
        fn engine(&self) -> Engine {
            Engine::Sqlite
        }
        async fn database_exists(&self, name: &str) -> Result<bool, TenancyError> {
            self.inner.database_exists(name).await
        }
        async fn create_database(&self, name: &str) -> Result<(), TenancyError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(TenancyError::Database(DbErr::Custom("disk full".into())));
            }
            self.inner.create_database(name).await
        }
        async fn drop_database(&self, name: &str) -> Result<(), TenancyError> {
            self.inner.drop_database(name).await
        }
        fn connection_url(&self, spec: &ConnectionSpec) -> String {
            self.inner.connection_url(spec)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<Notification>>);

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, n: &Notification) -> Result<(), CollaboratorError> {
            self.0.lock().unwrap().push(n.clone());
            Ok(())
        }
    }

    struct BrokenNotifier;

    #[async_trait]
    impl Notifier for BrokenNotifier {
        async fn send(&self, _: &Notification) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::Upstream("smtp down".into()))
        }
    }

    fn credentials() -> TenantCredentials {
        TenantCredentials {
            user: "campus".into(),
            password: "tenant-pw".into(),
            host: "127.0.0.1".into(),
            port: 5432,
        }
    }

    async fn control() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        for name in ["CBSE", "ICSE"] {
            board::ActiveModel {
                board_name: Set(name.into()),
                is_active: Set(true),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();
        }
        db
    }

    fn provisioner_with(
        db: DatabaseConnection,
        server: Arc<dyn DatabaseServer>,
        notifier: Arc<dyn Notifier>,
    ) -> TenantProvisioner {
        let registry = Arc::new(ConnectionRegistry::new(db));
        let loader = Arc::new(ConnectionLoader::new(registry, server, KEY));
        TenantProvisioner::new(loader, notifier, credentials())
    }

    async fn provisioner() -> TenantProvisioner {
        provisioner_with(
            control().await,
            Arc::new(SqliteServer::in_memory()),
            Arc::new(TracingNotifier),
        )
    }

    fn new_school(name: &str, admin: &str) -> NewSchool {
        NewSchool {
            name: name.to_string(),
            address: "1 Lake Rd".into(),
            contact_number: None,
            email: None,
            board_ids: vec![1],
            admin: NewSchoolAdmin {
                user_name: admin.to_string(),
                email: format!("{admin}@school.example"),
                password: "Adm1n!pass".into(),
                first_name: None,
                last_name: None,
                phone_number: None,
            },
            academic_start_year: Some(2025),
            academic_end_year: Some(2026),
        }
    }

    async fn count_users_and_schools(p: &TenantProvisioner) -> (u64, u64) {
        let db = p.loader.registry().control();
        (
            app_user::Entity::find().count(db).await.unwrap(),
            school::Entity::find().count(db).await.unwrap(),
        )
    }

    #[test]
    fn db_names_are_slugged_and_distinct() {
        assert_eq!(derive_db_name("Lakeside", 12), "lakeside_12_db");
        let a = derive_db_name("Greenwood School", 5);
        let b = derive_db_name("greenwood-school", 9);
        assert_eq!(a, "greenwood_school_5_db");
        assert_eq!(b, "greenwood_school_9_db");
        assert_ne!(a, b);
        assert_eq!(derive_db_name("  St. Mary's  ", 3), "st_mary_s_3_db");
        assert_eq!(derive_db_name("!!!", 4), "school_4_db");
    }

    #[test]
    fn long_names_fit_identifier_limit() {
        let name = derive_db_name(&"x".repeat(200), 123456);
        assert!(name.len() <= MAX_DB_NAME);
        assert!(name.ends_with("_123456_db"));
        assert!(validate_db_name(&name).is_ok());
    }

    #[tokio::test]
    async fn provision_creates_ready_tenant() {
        let notifier = Arc::new(RecordingNotifier::default());
        let p = provisioner_with(
            control().await,
            Arc::new(SqliteServer::in_memory()),
            notifier.clone(),
        );
        let done = p.provision(new_school("Lakeside", "lakeadmin")).await.unwrap();
        assert_eq!(done.db_name, "lakeside_1_db");
        assert!(done.catalog_replicated);

        let control = p.loader.registry().control();
        let record = school_db_metadata::Entity::find()
            .one(control)
            .await
            .unwrap()
            .unwrap();
        assert!(record.provisioning_complete);
        assert_ne!(record.db_password, "tenant-pw");

        let admin = app_user::Entity::find_by_id(done.admin_user_id.unwrap())
            .one(control)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.school_id, Some(done.school_id));

        let key = DbKey::new("lakeside_1_db");
        assert!(p.loader.registry().is_ready(&key));
        let tenant = p.router().connection_at(&key).unwrap();
        let year = academic_year::Entity::find_by_id(done.academic_year_id)
            .one(&tenant)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((year.start_year, year.end_year), (Some(2025), Some(2026)));

        let sent = notifier.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::Welcome);
        assert_eq!(sent[0].to, "lakeadmin@school.example");
    }

    #[tokio::test]
    async fn record_collision_rolls_back_user_and_school() {
        let p = provisioner().await;
        let control = p.loader.registry().control();
        let now = Utc::now().naive_utc();
        let placeholder = school::ActiveModel {
            name: Set("Placeholder".into()),
            address: Set("-".into()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(control)
        .await
        .unwrap();
        // The next school gets id 2; claim its database name first.
        school_db_metadata::ActiveModel {
            school_id: Set(placeholder.id),
            db_name: Set("greenwood_2_db".into()),
            db_user: Set("campus".into()),
            db_password: Set("x".into()),
            db_host: Set("127.0.0.1".into()),
            db_port: Set(5432),
            is_active: Set(true),
            provisioning_complete: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(control)
        .await
        .unwrap();

        let err = p.provision(new_school("Greenwood", "gwadmin")).await.unwrap_err();
        assert!(matches!(err, TenancyError::Conflict(_)), "got {err:?}");
        assert_eq!(count_users_and_schools(&p).await, (0, 1));
    }

    #[tokio::test]
    async fn invalid_boards_roll_back() {
        let p = provisioner().await;
        let mut new = new_school("Oak", "oakadmin");
        new.board_ids = vec![99];
        let err = p.provision(new).await.unwrap_err();
        assert!(matches!(err, TenancyError::Validation(_)));
        assert_eq!(count_users_and_schools(&p).await, (0, 0));
    }

    #[tokio::test]
    async fn weak_password_creates_nothing() {
        let p = provisioner().await;
        let mut new = new_school("Oak", "oakadmin");
        new.admin.password = "password".into();
        let err = p.provision(new).await.unwrap_err();
        assert!(matches!(err, TenancyError::Validation(_)));
        assert_eq!(count_users_and_schools(&p).await, (0, 0));
    }

    #[tokio::test]
    async fn duplicate_admin_user_name_is_conflict() {
        let p = provisioner().await;
        p.provision(new_school("Oak", "shared")).await.unwrap();
        let err = p.provision(new_school("Elm", "shared")).await.unwrap_err();
        assert!(matches!(err, TenancyError::Conflict(_)));
        assert_eq!(count_users_and_schools(&p).await, (1, 1));
    }

    #[tokio::test]
    async fn failed_phase_is_reported_and_resumable() {
        let server = Arc::new(FlakyServer {
            inner: SqliteServer::in_memory(),
            fail_create: AtomicBool::new(true),
        });
        let p = provisioner_with(control().await, server.clone(), Arc::new(TracingNotifier));

        let err = p.provision(new_school("Birch", "birchadmin")).await.unwrap_err();
        match err {
            TenancyError::ProvisioningFailed { school_id, db_name, phase, .. } => {
                assert_eq!(school_id, 1);
                assert_eq!(db_name, "birch_1_db");
                assert_eq!(phase, ProvisionPhase::CreateDatabase);
            }
            other => panic!("unexpected {other:?}"),
        }
        let key = DbKey::new("birch_1_db");
        assert!(p.router().connection_at(&key).is_err());

        server.fail_create.store(false, Ordering::SeqCst);
        let report = p.reconcile_incomplete().await.unwrap();
        assert_eq!(report.resumed.len(), 1);
        assert!(report.failed.is_empty());
        assert!(p.router().connection_at(&key).is_ok());

        let err = p.resume(1).await.unwrap_err();
        assert!(matches!(err, TenancyError::Conflict(_)), "complete tenants are not resumed");
    }

    #[tokio::test]
    async fn edit_school_updates_fields_and_remaps_boards() {
        let p = provisioner().await;
        let done = p.provision(new_school("Oak", "oakadmin")).await.unwrap();
        let control = p.loader.registry().control();
        let ib = board::ActiveModel {
            board_name: Set("IB".into()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(control)
        .await
        .unwrap();

        let updated = p
            .edit_school(
                done.school_id,
                SchoolEdit {
                    address: Some("2 Oak Ave".into()),
                    board_ids: Some(vec![ib.id, 999]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.address, "2 Oak Ave");
        assert_eq!(updated.name, "Oak", "omitted fields are kept");

        let mapped: Vec<i32> = school_board_mapping::Entity::find()
            .filter(school_board_mapping::Column::SchoolId.eq(done.school_id))
            .all(control)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.board_id)
            .collect();
        assert_eq!(mapped, vec![ib.id]);
    }

    #[tokio::test]
    async fn edit_school_without_valid_boards_changes_nothing() {
        let p = provisioner().await;
        let done = p.provision(new_school("Oak", "oakadmin")).await.unwrap();
        let err = p
            .edit_school(
                done.school_id,
                SchoolEdit {
                    name: Some("Renamed".into()),
                    board_ids: Some(vec![999]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyError::Validation(_)));

        let control = p.loader.registry().control();
        let school = school::Entity::find_by_id(done.school_id)
            .one(control)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(school.name, "Oak");
        let mappings = school_board_mapping::Entity::find()
            .filter(school_board_mapping::Column::SchoolId.eq(done.school_id))
            .count(control)
            .await
            .unwrap();
        assert_eq!(mappings, 1);

        let err = p.edit_school(404, SchoolEdit::default()).await.unwrap_err();
        assert!(matches!(err, TenancyError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_resume_of_one_school_runs_once() {
        let server = Arc::new(FlakyServer {
            inner: SqliteServer::in_memory(),
            fail_create: AtomicBool::new(true),
        });
        let p = provisioner_with(control().await, server.clone(), Arc::new(TracingNotifier));
        p.provision(new_school("Birch", "birchadmin")).await.unwrap_err();
        server.fail_create.store(false, Ordering::SeqCst);

        let (first, second) = tokio::join!(p.resume(1), p.resume(1));
        assert!(first.is_ok());
        match second {
            Err(TenancyError::Conflict(msg)) => assert!(msg.contains("already running")),
            other => panic!("unexpected {other:?}"),
        }

        let years = academic_year::Entity::find()
            .count(&p.router().connection_at(&DbKey::new("birch_1_db")).unwrap())
            .await
            .unwrap();
        assert_eq!(years, 1);

        // the slot is released once the first resume finishes
        let err = p.resume(1).await.unwrap_err();
        assert!(!err.to_string().contains("already running"));
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_provisioning() {
        let p = provisioner_with(
            control().await,
            Arc::new(SqliteServer::in_memory()),
            Arc::new(BrokenNotifier),
        );
        assert!(p.provision(new_school("Pine", "pineadmin")).await.is_ok());
    }

    #[tokio::test]
    async fn deactivate_drops_registry_entry() {
        let p = provisioner().await;
        let done = p.provision(new_school("Maple", "mapleadmin")).await.unwrap();
        p.deactivate(done.school_id).await.unwrap();

        let key = DbKey::new(&done.db_name);
        assert!(!p.loader.registry().contains(&key));
        let record = school_db_metadata::Entity::find()
            .one(p.loader.registry().control())
            .await
            .unwrap()
            .unwrap();
        assert!(!record.is_active);
        assert!(matches!(
            p.resume(done.school_id).await,
            Err(TenancyError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn migrate_all_covers_every_tenant() {
        let p = provisioner().await;
        p.provision(new_school("Oak", "oakadmin")).await.unwrap();
        p.provision(new_school("Elm", "elmadmin")).await.unwrap();
        let report = p.migrate_all_tenants().await.unwrap();
        assert_eq!(report.succeeded.len(), 2);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn migrate_all_reports_tenants_that_cannot_load() {
        let p = provisioner().await;
        p.provision(new_school("Oak", "oakadmin")).await.unwrap();

        let control = p.loader.registry().control();
        let now = Utc::now().naive_utc();
        let broken = school::ActiveModel {
            name: Set("Bad".into()),
            address: Set("-".into()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(control)
        .await
        .unwrap();
        school_db_metadata::ActiveModel {
            school_id: Set(broken.id),
            db_name: Set(format!("bad_{}_db", broken.id)),
            db_user: Set("campus".into()),
            db_password: Set("garbage".into()),
            db_host: Set("127.0.0.1".into()),
            db_port: Set(5432),
            is_active: Set(true),
            provisioning_complete: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(control)
        .await
        .unwrap();

        let report = p.migrate_all_tenants().await.unwrap();
        assert_eq!(report.succeeded, vec![DbKey::new("oak_1_db")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].db_key, DbKey::new(format!("bad_{}_db", broken.id)));
    }

    #[tokio::test]
    async fn progress_reports_every_phase_in_order() {
        let p = provisioner().await;
        let seen = Mutex::new(Vec::new());
        let record = |phase: ProvisionPhase, _: &str| seen.lock().unwrap().push(phase);
        p.provision_with_progress(new_school("Cedar", "cedaradmin"), &record)
            .await
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ProvisionPhase::Record,
                ProvisionPhase::CreateDatabase,
                ProvisionPhase::Register,
                ProvisionPhase::Migrate,
                ProvisionPhase::SeedAcademicYear,
                ProvisionPhase::Finalize,
                ProvisionPhase::Notify,
                ProvisionPhase::Replicate,
            ]
        );
    }
}
