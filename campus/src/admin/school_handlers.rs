use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        Json,
        sse::{Event, KeepAlive, Sse},
    },
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::admin::dto::*;
use crate::admin::jwt::SuperAdminClaims;
use crate::admin::provision_job::{ProvisionEvent, ProvisionJob};
use crate::admin::{ApiErr, AppState};
use crate::entity::{school, school_db_metadata};
use crate::tenancy::{
    DbKey, MigrationReport, NewSchool, ProvisionPhase, ProvisionedSchool, SchoolEdit,
};

// ---------- POST /schools: submit a provisioning job ----------

pub async fn submit_provision(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
    Json(new): Json<NewSchool>,
) -> Result<(StatusCode, Json<SubmitProvisionResponse>), ApiErr> {
    if new.name.trim().is_empty() {
        return Err(ApiErr::unprocessable("School name is required"));
    }

    let job = ProvisionJob::new(new.name.clone());
    let job_id = job.id.clone();
    let cancel = job.cancel.clone();
    let tx = job.tx.clone();

    {
        let mut store = state.job_store.lock().await;
        store.try_register(job).map_err(|existing_id| {
            ApiErr::conflict(format!(
                "Provisioning already in progress (job_id: {existing_id})"
            ))
        })?;
    }

    let state_clone = state.clone();
    let job_id_clone = job_id.clone();
    tokio::spawn(async move {
        run_provision_job(&state_clone, new, job_id_clone, tx, cancel).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitProvisionResponse { job_id }),
    ))
}

// ---------- Core runner: HTTP-independent ----------

enum Outcome {
    Provisioned(ProvisionedSchool),
    Failed(String),
    Cancelled,
}

/// Dropping the provisioning future on cancel or timeout rolls back an open
/// control-plane transaction; a tenant left half-built stays incomplete and
/// can be resumed.
async fn run_provision_job(
    state: &AppState,
    new: NewSchool,
    job_id: String,
    tx: broadcast::Sender<ProvisionEvent>,
    cancel: CancellationToken,
) {
    let send = |event: ProvisionEvent| {
        let _ = tx.send(event);
    };
    let progress = |phase: ProvisionPhase, detail: &str| {
        let _ = tx.send(ProvisionEvent::Progress {
            phase: phase.as_str().to_string(),
            detail: detail.to_string(),
        });
    };

    let school_name = new.name.clone();
    let work = state.provisioner.provision_with_progress(new, &progress);
    let outcome = tokio::select! {
        _ = cancel.cancelled() => Outcome::Cancelled,
        r = tokio::time::timeout(state.provision_timeout, work) => match r {
            Ok(Ok(done)) => Outcome::Provisioned(done),
            Ok(Err(e)) => Outcome::Failed(e.to_string()),
            Err(_) => Outcome::Failed(format!(
                "Provisioning timed out after {}s",
                state.provision_timeout.as_secs()
            )),
        },
    };

    match outcome {
        Outcome::Provisioned(done) => {
            let data = serde_json::to_value(&done).unwrap_or(serde_json::Value::Null);
            send(ProvisionEvent::Result { data: data.clone() });
            send(ProvisionEvent::Done);
            state.job_store.lock().await.complete(&job_id, data);
        }
        Outcome::Cancelled => {
            tracing::warn!(school = %school_name, job_id = %job_id, "provisioning cancelled");
            send(ProvisionEvent::Cancelled);
            state.job_store.lock().await.fail(&job_id, "cancelled".to_string());
        }
        Outcome::Failed(msg) => {
            tracing::error!(school = %school_name, job_id = %job_id, error = %msg, "provisioning job failed");
            send(ProvisionEvent::Error {
                message: msg.clone(),
            });
            state.job_store.lock().await.fail(&job_id, msg);
        }
    }
}

// ---------- GET /schools/jobs/{job_id}/events: SSE stream ----------

pub async fn provision_events(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiErr> {
    let rx = {
        let store = state.job_store.lock().await;
        match store.subscribe(&job_id) {
            Some(rx) => rx,
            None => {
                return Err(ApiErr::not_found("Job not found"));
            }
        }
    };

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let sse_event = event.to_sse_event().ok()?;
            Some(Ok(sse_event))
        }
        Err(_) => None, // lagged, skip
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

// ---------- DELETE /schools/jobs/{job_id}: cancel ----------

pub async fn cancel_provision(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let cancelled = state.job_store.lock().await.cancel(&job_id);
    if cancelled {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiErr::not_found("Job not found or not running"))
    }
}

// ---------- GET /schools/jobs/{job_id}: poll status ----------

pub async fn provision_status(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiErr> {
    let store = state.job_store.lock().await;
    let job = store
        .get(&job_id)
        .ok_or_else(|| ApiErr::not_found("Job not found"))?;

    Ok(Json(JobStatusResponse {
        job_id: job.id.clone(),
        school_name: job.school_name.clone(),
        status: job.status.as_str().to_string(),
        result: job.result.clone(),
        error: job.error.clone(),
    }))
}

// ---------- schools ----------

pub async fn list_schools(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
) -> Result<Json<Vec<SchoolResponse>>, ApiErr> {
    let schools = school::Entity::find()
        .order_by_asc(school::Column::Id)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    let mut records: HashMap<i32, school_db_metadata::Model> = school_db_metadata::Entity::find()
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .into_iter()
        .map(|r| (r.school_id, r))
        .collect();

    let registry = state.loader.registry();
    let out = schools
        .into_iter()
        .map(|s| {
            let db = records.remove(&s.id).map(|r| {
                let ready = registry.is_ready(&DbKey::new(&r.db_name));
                (r, ready)
            });
            SchoolResponse::new(s, db)
        })
        .collect();
    Ok(Json(out))
}

pub async fn get_school(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SchoolResponse>, ApiErr> {
    let s = school::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("School not found"))?;
    let record = school_db_metadata::Entity::find()
        .filter(school_db_metadata::Column::SchoolId.eq(id))
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    let registry = state.loader.registry();
    let db = record.map(|r| {
        let ready = registry.is_ready(&DbKey::new(&r.db_name));
        (r, ready)
    });
    Ok(Json(SchoolResponse::new(s, db)))
}

pub async fn edit_school(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(edit): Json<SchoolEdit>,
) -> Result<Json<SchoolResponse>, ApiErr> {
    let s = state.provisioner.edit_school(id, edit).await?;
    let record = school_db_metadata::Entity::find()
        .filter(school_db_metadata::Column::SchoolId.eq(id))
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    let registry = state.loader.registry();
    let db = record.map(|r| {
        let ready = registry.is_ready(&DbKey::new(&r.db_name));
        (r, ready)
    });
    Ok(Json(SchoolResponse::new(s, db)))
}

pub async fn resume_school(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProvisionedSchool>, ApiErr> {
    let done = tokio::time::timeout(state.provision_timeout, state.provisioner.resume(id))
        .await
        .map_err(|_| ApiErr::new(StatusCode::GATEWAY_TIMEOUT, "Resume timed out"))??;
    Ok(Json(done))
}

pub async fn deactivate_school(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiErr> {
    state.provisioner.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn migrate_tenants(
    _claims: SuperAdminClaims,
    State(state): State<AppState>,
) -> Result<Json<MigrationReport>, ApiErr> {
    Ok(Json(state.provisioner.migrate_all_tenants().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{api_router, provision_job::JobStatus, test_support};
    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use tower::ServiceExt;

    fn new_school_json(name: &str, admin: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "address": "1 Lake Rd",
            "board_ids": [1],
            "admin": {
                "user_name": admin,
                "email": format!("{admin}@school.example"),
                "password": test_support::PASSWORD,
            },
            "academic_start_year": 2025,
            "academic_end_year": 2026,
        })
    }

    async fn wait_for_job(state: &AppState, job_id: &str) -> JobStatus {
        for _ in 0..200 {
            let status = state.job_store.lock().await.get(job_id).map(|j| j.status.clone());
            match status {
                Some(JobStatus::Running) | None => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Some(done) => return done,
            }
        }
        panic!("job {job_id} did not finish");
    }

    #[tokio::test]
    async fn submit_runs_job_to_completion() {
        let state = test_support::state().await;
        let app = api_router(state.clone(), &[]);
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/schools")
                    .header("Authorization", test_support::superadmin_bearer())
                    .header("content-type", "application/json")
                    .body(Body::from(new_school_json("Lakeside", "lakeadmin").to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let job_id = test_support::json_body(resp).await["job_id"]
            .as_str()
            .unwrap()
            .to_string();

        assert_eq!(wait_for_job(&state, &job_id).await, JobStatus::Completed);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/schools")
                    .header("Authorization", test_support::superadmin_bearer())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = test_support::json_body(resp).await;
        assert_eq!(json[0]["name"], "Lakeside");
        assert_eq!(json[0]["database"]["db_name"], "lakeside_1_db");
        assert_eq!(json[0]["database"]["provisioning_complete"], true);
        assert_eq!(json[0]["database"]["ready"], true);
    }

    #[tokio::test]
    async fn failed_job_reports_error() {
        let state = test_support::state().await;
        let mut body = new_school_json("Oak", "oakadmin");
        body["board_ids"] = serde_json::json!([77]);
        let resp = api_router(state.clone(), &[])
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/schools")
                    .header("Authorization", test_support::superadmin_bearer())
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let job_id = test_support::json_body(resp).await["job_id"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(wait_for_job(&state, &job_id).await, JobStatus::Failed);
        let store = state.job_store.lock().await;
        assert!(
            store
                .get(&job_id)
                .unwrap()
                .error
                .as_deref()
                .unwrap()
                .contains("valid board")
        );
    }

    #[tokio::test]
    async fn school_users_cannot_provision() {
        let state = test_support::state().await;
        let resp = api_router(state, &[])
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/schools")
                    .header("Authorization", test_support::school_bearer(1, "admin"))
                    .header("content-type", "application/json")
                    .body(Body::from(new_school_json("Oak", "oakadmin").to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn deactivate_then_detail() {
        let state = test_support::state().await;
        let done = test_support::provision(&state, "Maple").await;
        let app = api_router(state, &[]);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(format!("/api/v1/schools/{}/deactivate", done.school_id))
                    .header("Authorization", test_support::superadmin_bearer())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/schools/{}", done.school_id))
                    .header("Authorization", test_support::superadmin_bearer())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = test_support::json_body(resp).await;
        assert_eq!(json["is_active"], false);
        assert_eq!(json["database"]["ready"], false);
    }

    #[tokio::test]
    async fn unknown_school_is_not_found() {
        let state = test_support::state().await;
        let resp = api_router(state, &[])
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/schools/404/resume")
                    .header("Authorization", test_support::superadmin_bearer())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn edit_school_requires_superadmin_and_applies_changes() {
        let state = test_support::state().await;
        let oak = test_support::provision(&state, "Oak").await;
        let app = api_router(state.clone(), &[]);
        let put = |bearer: String| {
            Request::builder()
                .method(Method::PUT)
                .uri(format!("/api/v1/schools/{}", oak.school_id))
                .header("Authorization", bearer)
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({"name": "Oak Grove", "board_ids": [1, 2]}).to_string(),
                ))
                .unwrap()
        };

        let resp = app
            .clone()
            .oneshot(put(test_support::school_bearer(oak.school_id, "admin")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app.oneshot(put(test_support::superadmin_bearer())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = test_support::json_body(resp).await;
        assert_eq!(json["name"], "Oak Grove");
        assert_eq!(json["database"]["db_name"], oak.db_name);

        let boards = crate::entity::school_board_mapping::Entity::find()
            .filter(crate::entity::school_board_mapping::Column::SchoolId.eq(oak.school_id))
            .all(&state.db)
            .await
            .unwrap();
        assert_eq!(boards.len(), 2);
    }
}
