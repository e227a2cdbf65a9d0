//! Academic years and class sections, stored in the caller's school
//! database.

use axum::{extract::State, http::StatusCode, response::Json};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::admin::dto::*;
use crate::admin::jwt::TenantClaims;
use crate::admin::{ApiErr, AppState};
use crate::entity::{academic_year, school_class, school_section};
use crate::tenancy::is_unique_violation;

fn require_school_admin(tenant: &TenantClaims) -> Result<(), ApiErr> {
    if tenant.claims.is_school_admin() {
        Ok(())
    } else {
        Err(ApiErr::new(StatusCode::FORBIDDEN, "School admin access required"))
    }
}

pub async fn list_academic_years(
    _tenant: TenantClaims,
    State(state): State<AppState>,
) -> Result<Json<Vec<AcademicYearResponse>>, ApiErr> {
    let db = state.router.connection::<academic_year::Entity>()?;
    let years = academic_year::Entity::find()
        .order_by_desc(academic_year::Column::StartYear)
        .all(&db)
        .await
        .map_err(ApiErr::internal)?;
    Ok(Json(years.into_iter().map(Into::into).collect()))
}

pub async fn create_academic_year(
    tenant: TenantClaims,
    State(state): State<AppState>,
    Json(body): Json<CreateAcademicYearRequest>,
) -> Result<(StatusCode, Json<AcademicYearResponse>), ApiErr> {
    require_school_admin(&tenant)?;
    if body.end_year <= body.start_year {
        return Err(ApiErr::unprocessable(
            "end_year must be after start_year",
        ));
    }

    let db = state.router.connection::<academic_year::Entity>()?;
    let year = academic_year::ActiveModel {
        start_year: Set(Some(body.start_year)),
        end_year: Set(Some(body.end_year)),
        is_active: Set(body.is_active),
        ..Default::default()
    }
    .insert(&db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiErr::conflict("Academic year already exists")
        } else {
            ApiErr::internal(e)
        }
    })?;

    tracing::info!(db = %tenant.db_key, academic_year_id = year.id, "academic year created");
    Ok((StatusCode::CREATED, Json(year.into())))
}

pub async fn list_sections(
    _tenant: TenantClaims,
    State(state): State<AppState>,
) -> Result<Json<Vec<SectionResponse>>, ApiErr> {
    let db = state.router.connection::<school_section::Entity>()?;
    let rows = school_section::Entity::find()
        .find_also_related(school_class::Entity)
        .order_by_asc(school_section::Column::ClassId)
        .order_by_asc(school_section::Column::Section)
        .all(&db)
        .await
        .map_err(ApiErr::internal)?;
    Ok(Json(
        rows.into_iter()
            .map(|(s, c)| {
                let class_number = c.map(|c| c.class_number).unwrap_or_default();
                SectionResponse::new(s, class_number)
            })
            .collect(),
    ))
}

/// Creates the section, and its class if this is the first section of that
/// class number.
pub async fn create_section(
    tenant: TenantClaims,
    State(state): State<AppState>,
    Json(body): Json<CreateSectionRequest>,
) -> Result<(StatusCode, Json<SectionResponse>), ApiErr> {
    require_school_admin(&tenant)?;
    let section_name = body.section.trim().to_uppercase();
    if section_name.is_empty() {
        return Err(ApiErr::unprocessable("Section name is required"));
    }

    let db = state.router.connection::<school_section::Entity>()?;
    let txn = db.begin().await.map_err(ApiErr::internal)?;

    let class = match school_class::Entity::find()
        .filter(school_class::Column::ClassNumber.eq(body.class_number))
        .one(&txn)
        .await
        .map_err(ApiErr::internal)?
    {
        Some(c) => c,
        None => school_class::ActiveModel {
            class_number: Set(body.class_number),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ApiErr::internal)?,
    };

    let section = school_section::ActiveModel {
        class_id: Set(class.id),
        section: Set(section_name),
        board_id: Set(body.board_id),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiErr::conflict("Section already exists for this class")
        } else {
            ApiErr::internal(e)
        }
    })?;
    txn.commit().await.map_err(ApiErr::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(SectionResponse::new(section, class.class_number)),
    ))
}

#[cfg(test)]
mod tests {
    use crate::admin::{api_router, test_support};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn post(uri: &str, bearer: String, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("Authorization", bearer)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, bearer: String) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("Authorization", bearer)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn academic_years_are_per_school() {
        let state = test_support::state().await;
        let oak = test_support::provision(&state, "Oak").await;
        let elm = test_support::provision(&state, "Elm").await;
        let app = api_router(state, &[]);

        let resp = app
            .clone()
            .oneshot(post(
                "/api/v1/academic-years",
                test_support::school_bearer(oak.school_id, "admin"),
                serde_json::json!({"start_year": 2030, "end_year": 2031}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let oak_years = test_support::json_body(
            app.clone()
                .oneshot(get(
                    "/api/v1/academic-years",
                    test_support::school_bearer(oak.school_id, "teacher"),
                ))
                .await
                .unwrap(),
        )
        .await;
        let elm_years = test_support::json_body(
            app.oneshot(get(
                "/api/v1/academic-years",
                test_support::school_bearer(elm.school_id, "admin"),
            ))
            .await
            .unwrap(),
        )
        .await;

        assert_eq!(oak_years.as_array().unwrap().len(), 2);
        assert_eq!(oak_years[0]["start_year"], 2030);
        assert_eq!(elm_years.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_school_admins_create() {
        let state = test_support::state().await;
        let oak = test_support::provision(&state, "Oak").await;
        let resp = api_router(state, &[])
            .oneshot(post(
                "/api/v1/academic-years",
                test_support::school_bearer(oak.school_id, "teacher"),
                serde_json::json!({"start_year": 2030, "end_year": 2031}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn duplicate_year_and_bad_span() {
        let state = test_support::state().await;
        let oak = test_support::provision(&state, "Oak").await;
        let app = api_router(state, &[]);
        let bearer = || test_support::school_bearer(oak.school_id, "admin");

        // 2025-2026 was seeded at provisioning time
        let resp = app
            .clone()
            .oneshot(post(
                "/api/v1/academic-years",
                bearer(),
                serde_json::json!({"start_year": 2025, "end_year": 2026}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app
            .oneshot(post(
                "/api/v1/academic-years",
                bearer(),
                serde_json::json!({"start_year": 2026, "end_year": 2026}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn superadmin_without_school_is_refused() {
        let state = test_support::state().await;
        let resp = api_router(state, &[])
            .oneshot(get(
                "/api/v1/academic-years",
                test_support::superadmin_bearer(),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn sections_reuse_classes() {
        let state = test_support::state().await;
        let oak = test_support::provision(&state, "Oak").await;
        let app = api_router(state, &[]);
        let bearer = || test_support::school_bearer(oak.school_id, "admin");

        for section in ["a", "B"] {
            let resp = app
                .clone()
                .oneshot(post(
                    "/api/v1/sections",
                    bearer(),
                    serde_json::json!({"class_number": 6, "section": section}),
                ))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
        }
        let json = test_support::json_body(
            app.oneshot(get("/api/v1/sections", bearer())).await.unwrap(),
        )
        .await;
        let sections = json.as_array().unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0]["section"], "A");
        assert_eq!(sections[0]["class_id"], sections[1]["class_id"]);
        assert_eq!(sections[1]["class_number"], 6);
    }
}
