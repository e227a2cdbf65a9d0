pub use sea_orm_migration::prelude::*;

mod m20250610_000001_create_auth_tables;
mod m20250610_000002_create_school_tables;
mod m20250612_000003_create_catalog_tables;
mod m20250620_000004_add_provisioning_complete;

mod t20250610_000001_create_academic_tables;
mod t20250610_000002_create_people_tables;
mod t20250610_000003_create_syllabus_tables;

/// Control-plane schema: auth, schools, tenant connection records, shared catalog.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250610_000001_create_auth_tables::Migration),
            Box::new(m20250610_000002_create_school_tables::Migration),
            Box::new(m20250612_000003_create_catalog_tables::Migration),
            Box::new(m20250620_000004_add_provisioning_complete::Migration),
        ]
    }
}

/// Tenant schema, applied to every per-school database and never to the control plane.
pub struct TenantMigrator;

#[async_trait::async_trait]
impl MigratorTrait for TenantMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(t20250610_000001_create_academic_tables::Migration),
            Box::new(t20250610_000002_create_people_tables::Migration),
            Box::new(t20250610_000003_create_syllabus_tables::Migration),
        ]
    }
}
