//! Binds the caller's school database for the lifetime of one request.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::entity::school_db_metadata;
use crate::tenancy::{self, DbKey};

use super::AppState;
use super::jwt::decode_jwt;

/// Runs the rest of the request inside a tenant scope. If the bearer token
/// names a school with an active database, that database is selected,
/// loading it first when it is not registered yet; otherwise the scope stays
/// empty and tenant entities route to the control plane.
pub async fn tenant_scope(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(e) = state.loader.ensure_loaded().await {
        tracing::error!(error = %e, "failed to load tenant databases");
    }

    let school_id = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(|t| decode_jwt(t, &state.jwt_secret).ok())
        .and_then(|c| c.school_id);

    let key = match school_id {
        Some(id) => resolve(&state, id).await,
        None => None,
    };

    tenancy::scope(async move {
        if let Some(key) = key
            && let Err(e) = tenancy::set_active_tenant(Some(key))
        {
            tracing::error!(error = %e, "could not select tenant database");
        }
        next.run(req).await
    })
    .await
}

async fn resolve(state: &AppState, school_id: i32) -> Option<DbKey> {
    let record = school_db_metadata::Entity::find()
        .filter(school_db_metadata::Column::SchoolId.eq(school_id))
        .filter(school_db_metadata::Column::IsActive.eq(true))
        .one(&state.db)
        .await;
    match record {
        Ok(Some(r)) => {
            let key = DbKey::new(&r.db_name);
            // provisioned by another process since the bulk load
            if r.provisioning_complete
                && !state.loader.registry().is_ready(&key)
                && let Err(e) = state.loader.load_record(&r).await
            {
                tracing::error!(school_id, db = %key, error = %e, "failed to load school database");
            }
            Some(key)
        }
        Ok(None) => {
            tracing::warn!(school_id, "no active database for school");
            None
        }
        Err(e) => {
            tracing::error!(school_id, error = %e, "failed to look up school database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use crate::admin::{api_router, test_support};
    use crate::tenancy::SqliteServer;

    #[tokio::test]
    async fn school_provisioned_elsewhere_is_served_without_restart() {
        let dir = tempfile::tempdir().unwrap();
        let control = test_support::control().await;
        let serving = test_support::state_on(
            control.clone(),
            Arc::new(SqliteServer::new(dir.path())),
        );
        serving.loader.ensure_loaded().await.unwrap();

        // a second process (the CLI) provisions against the same control plane
        let cli = test_support::state_on(control, Arc::new(SqliteServer::new(dir.path())));
        let oak = test_support::provision(&cli, "Oak").await;

        let resp = api_router(serving.clone(), &[])
            .oneshot(
                Request::builder()
                    .uri("/api/v1/academic-years")
                    .header("Authorization", test_support::school_bearer(oak.school_id, "admin"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let years = test_support::json_body(resp).await;
        assert_eq!(years.as_array().unwrap().len(), 1);
        assert!(
            serving
                .loader
                .registry()
                .is_ready(&crate::tenancy::DbKey::new(&oak.db_name))
        );
    }
}
