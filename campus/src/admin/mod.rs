use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::set_header::response::SetResponseHeaderLayer;

use crate::auth::Auth;
use crate::catalog::CatalogError;
use crate::collaborators::{
    LocalObjectStore, Notifier, ObjectStore, SyllabusExtractor, TracingNotifier,
    UnconfiguredExtractor,
};
use crate::password_reset::ResetCodes;
use crate::tenancy::{
    ConnectionLoader, ConnectionRegistry, DatabaseRouter, DatabaseServer, TenancyError,
    TenantCredentials, TenantProvisioner,
};

pub mod academic_handlers;
pub mod auth_handlers;
pub mod catalog_handlers;
pub mod dto;
pub mod jwt;
pub mod provision_job;
pub mod school_handlers;
pub mod student_handlers;
pub mod teacher_handlers;
pub mod tenant_scope;

#[cfg(test)]
pub(crate) mod test_support;

// ---------- shared state ----------

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Auth>,
    /// Control-plane connection.
    pub db: DatabaseConnection,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub loader: Arc<ConnectionLoader>,
    pub router: DatabaseRouter,
    pub provisioner: Arc<TenantProvisioner>,
    pub object_store: Arc<dyn ObjectStore>,
    pub extractor: Arc<dyn SyllabusExtractor>,
    pub notifier: Arc<dyn Notifier>,
    /// Outstanding password-reset codes.
    pub reset_codes: Arc<ResetCodes>,
    /// In-memory registry of background provisioning jobs.
    pub job_store: Arc<Mutex<provision_job::JobStore>>,
    pub provision_timeout: Duration,
}

impl AppState {
    /// Wire the tenancy components around a migrated control-plane
    /// connection. Collaborators start with their local defaults.
    pub fn new(
        db: DatabaseConnection,
        server: Arc<dyn DatabaseServer>,
        master_key: [u8; 32],
        credentials: TenantCredentials,
        jwt_secret: String,
    ) -> Self {
        Self::with_notifier(
            db,
            server,
            master_key,
            credentials,
            jwt_secret,
            Arc::new(TracingNotifier),
        )
    }

    pub fn with_notifier(
        db: DatabaseConnection,
        server: Arc<dyn DatabaseServer>,
        master_key: [u8; 32],
        credentials: TenantCredentials,
        jwt_secret: String,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(db.clone()));
        let loader = Arc::new(ConnectionLoader::new(registry.clone(), server, master_key));
        let provisioner = Arc::new(TenantProvisioner::new(
            loader.clone(),
            notifier.clone(),
            credentials,
        ));
        Self {
            auth: Arc::new(Auth::new(db.clone())),
            db,
            jwt_secret,
            jwt_expiry_hours: 24,
            loader,
            router: DatabaseRouter::new(registry),
            provisioner,
            object_store: Arc::new(LocalObjectStore::new("storage")),
            extractor: Arc::new(UnconfiguredExtractor),
            notifier,
            reset_codes: Arc::new(ResetCodes::default()),
            job_store: Arc::new(Mutex::new(provision_job::JobStore::new())),
            provision_timeout: Duration::from_secs(120),
        }
    }
}

// ---------- error type ----------

/// A JSON error response: `{"error": "..."}` with an HTTP status.
#[derive(Debug)]
pub struct ApiErr(StatusCode, String);

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(status, msg.into())
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(StatusCode::CONFLICT, msg.into())
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self(StatusCode::UNPROCESSABLE_ENTITY, msg.into())
    }

    pub fn status(&self) -> StatusCode {
        self.0
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.1 });
        (self.0, Json(body)).into_response()
    }
}

impl From<TenancyError> for ApiErr {
    fn from(e: TenancyError) -> Self {
        match e {
            TenancyError::NotFound(_) => ApiErr::not_found(e.to_string()),
            TenancyError::Conflict(msg) => ApiErr::conflict(msg),
            TenancyError::Validation(msg) => ApiErr::unprocessable(msg),
            TenancyError::TenantNotReady(_) => {
                ApiErr::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            other => {
                tracing::error!(error = %other, "tenancy operation failed");
                ApiErr::internal(other)
            }
        }
    }
}

impl From<CatalogError> for ApiErr {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(_) => ApiErr::not_found(e.to_string()),
            CatalogError::Validation(msg) => ApiErr::unprocessable(msg),
            CatalogError::Extraction(_) => ApiErr::new(StatusCode::BAD_GATEWAY, e.to_string()),
            other => {
                tracing::error!(error = %other, "catalog operation failed");
                ApiErr::internal(other)
            }
        }
    }
}

// ---------- router ----------

pub fn api_router(state: AppState, cors_allowed_origins: &[String]) -> Router {
    let allowed_origins: Vec<HeaderValue> = cors_allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new() // no origins allowed = same-origin only
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api/v1", api_v1(state.clone()))
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(state)
}

fn api_v1(state: AppState) -> Router<AppState> {
    Router::new()
        // auth
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/me", get(auth_handlers::me))
        .route("/auth/password", put(auth_handlers::change_password))
        .route(
            "/auth/password-reset",
            post(auth_handlers::request_password_reset),
        )
        .route(
            "/auth/password-reset/confirm",
            post(auth_handlers::confirm_password_reset),
        )
        // shared catalog
        .route("/boards", get(catalog_handlers::list_boards))
        .route("/catalog/ebooks", post(catalog_handlers::upload_ebook))
        // schools and provisioning jobs
        .route(
            "/schools",
            get(school_handlers::list_schools).post(school_handlers::submit_provision),
        )
        .route(
            "/schools/jobs/{job_id}",
            get(school_handlers::provision_status).delete(school_handlers::cancel_provision),
        )
        .route(
            "/schools/jobs/{job_id}/events",
            get(school_handlers::provision_events),
        )
        .route(
            "/schools/{id}",
            get(school_handlers::get_school).put(school_handlers::edit_school),
        )
        .route("/schools/{id}/resume", post(school_handlers::resume_school))
        .route(
            "/schools/{id}/deactivate",
            post(school_handlers::deactivate_school),
        )
        .route("/tenants/migrate", post(school_handlers::migrate_tenants))
        // tenant-scoped
        .route(
            "/academic-years",
            get(academic_handlers::list_academic_years)
                .post(academic_handlers::create_academic_year),
        )
        .route(
            "/sections",
            get(academic_handlers::list_sections).post(academic_handlers::create_section),
        )
        .route(
            "/students",
            get(student_handlers::list_students).post(student_handlers::create_student),
        )
        .route(
            "/teachers",
            get(teacher_handlers::list_teachers).post(teacher_handlers::create_teacher),
        )
        .layer(middleware::from_fn_with_state(
            state,
            tenant_scope::tenant_scope,
        ))
}
