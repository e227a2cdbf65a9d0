//! Shared fixtures for the handler tests.

use std::sync::Arc;

use axum::response::Response;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use uuid::Uuid;

use super::AppState;
use super::jwt::{Claims, encode_jwt};
use crate::entity::board;
use crate::tenancy::{
    DatabaseServer, NewSchool, NewSchoolAdmin, ProvisionedSchool, SqliteServer, TenantCredentials,
};

pub const PASSWORD: &str = "Adm1n!pass";
pub const JWT_SECRET: &str = "test-secret";

/// Migrated in-memory control plane with two boards (ids 1 and 2). Every
/// tenant database is a separate in-memory SQLite database.
pub async fn state() -> AppState {
    state_on(control().await, Arc::new(SqliteServer::in_memory()))
}

/// Migrated in-memory control plane with boards CBSE (1) and ICSE (2).
pub async fn control() -> DatabaseConnection {
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

/// State over an existing control plane; several states may share one.
pub fn state_on(db: DatabaseConnection, server: Arc<dyn DatabaseServer>) -> AppState {
    AppState::new(
        db,
        server,
        [7u8; 32],
        TenantCredentials {
            user: "campus".into(),
            password: "secret".into(),
            host: "localhost".into(),
            port: 5432,
        },
        JWT_SECRET.into(),
    )
}

pub async fn json_body(resp: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn bearer(claims: Claims) -> String {
    format!("Bearer {}", encode_jwt(&claims, JWT_SECRET).unwrap())
}

fn expiry() -> u64 {
    chrono::Utc::now().timestamp() as u64 + 3600
}

pub fn superadmin_bearer() -> String {
    bearer(Claims {
        sub: Uuid::new_v4(),
        username: "root".into(),
        role: Some("superadmin".into()),
        is_superuser: true,
        school_id: None,
        exp: expiry(),
    })
}

pub fn school_bearer(school_id: i32, role: &str) -> String {
    bearer(Claims {
        sub: Uuid::new_v4(),
        username: format!("{role}@{school_id}"),
        role: Some(role.into()),
        is_superuser: false,
        school_id: Some(school_id),
        exp: expiry(),
    })
}

/// Provision a school on board 1 with a 2025-2026 academic year.
pub async fn provision(state: &AppState, name: &str) -> ProvisionedSchool {
    let admin = format!("{}_admin", name.to_lowercase().replace(' ', "_"));
    state
        .provisioner
        .provision(NewSchool {
            name: name.into(),
            address: "1 School Lane".into(),
            contact_number: None,
            email: None,
            board_ids: vec![1],
            admin: NewSchoolAdmin {
                user_name: admin.clone(),
                email: format!("{admin}@campus.example"),
                password: PASSWORD.into(),
                first_name: None,
                last_name: None,
                phone_number: None,
            },
            academic_start_year: Some(2025),
            academic_end_year: Some(2026),
        })
        .await
        .unwrap()
}
