use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::admin::dto::*;
use crate::admin::jwt::TenantClaims;
use crate::admin::{ApiErr, AppState};
use crate::auth::{Auth, AuthError, NewUser};
use crate::entity::{academic_year, school_section, student, student_class_assignment};
use crate::tenancy::is_unique_violation;

pub async fn list_students(
    _tenant: TenantClaims,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentResponse>>, ApiErr> {
    let db = state.router.connection::<student::Entity>()?;
    let students = student::Entity::find()
        .order_by_asc(student::Column::RollNumber)
        .all(&db)
        .await
        .map_err(ApiErr::internal)?;

    // latest academic year wins
    let mut placement: HashMap<i32, (i32, i32)> = HashMap::new();
    for a in student_class_assignment::Entity::find()
        .order_by_asc(student_class_assignment::Column::AcademicYearId)
        .all(&db)
        .await
        .map_err(ApiErr::internal)?
    {
        placement.insert(a.student_id, (a.section_id, a.academic_year_id));
    }

    Ok(Json(
        students
            .into_iter()
            .map(|s| {
                let p = placement.get(&s.id).copied();
                StudentResponse::new(s, p)
            })
            .collect(),
    ))
}

/// Creates the login in the control plane and the student record in the
/// school database. The two writes are not atomic; if the school-side write
/// fails the login is deleted again.
pub async fn create_student(
    tenant: TenantClaims,
    State(state): State<AppState>,
    Json(body): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<StudentResponse>), ApiErr> {
    if !tenant.claims.is_school_admin() {
        return Err(ApiErr::new(StatusCode::FORBIDDEN, "School admin access required"));
    }
    let db = state.router.connection::<student::Entity>()?;

    school_section::Entity::find_by_id(body.section_id)
        .one(&db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Section not found"))?;
    let year = resolve_academic_year(&db, body.academic_year_id).await?;

    let user = Auth::create_user(
        &state.db,
        &NewUser {
            user_name: body.user_name.clone(),
            email: body.email.clone(),
            password: body.password.clone(),
            role: "student",
            school_id: Some(tenant.school_id),
            is_superuser: false,
            first_name: body.first_name.clone(),
            last_name: body.last_name.clone(),
            phone_number: body.phone_number.clone(),
        },
    )
    .await
    .map_err(|e| match e {
        AuthError::WeakPassword => ApiErr::unprocessable(e.to_string()),
        AuthError::Conflict(msg) => ApiErr::conflict(msg),
        other => ApiErr::internal(other),
    })?;

    match insert_student(&db, &body, user.id, year.id).await {
        Ok(created) => {
            tracing::info!(
                db = %tenant.db_key,
                student_id = created.id,
                user = %user.user_name,
                "student created"
            );
            Ok((
                StatusCode::CREATED,
                Json(StudentResponse::new(created, Some((body.section_id, year.id)))),
            ))
        }
        Err(e) => {
            let user_name = user.user_name.clone();
            if let Err(cleanup) = user.delete(&state.db).await {
                tracing::error!(
                    user = %user_name,
                    error = %cleanup,
                    "failed to remove login after student insert failed; remove it manually"
                );
            }
            if is_unique_violation(&e) {
                Err(ApiErr::conflict("Roll number already in use"))
            } else {
                Err(ApiErr::internal(e))
            }
        }
    }
}

async fn resolve_academic_year(
    db: &DatabaseConnection,
    requested: Option<i32>,
) -> Result<academic_year::Model, ApiErr> {
    match requested {
        Some(id) => academic_year::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ApiErr::internal)?
            .ok_or_else(|| ApiErr::not_found("Academic year not found")),
        None => academic_year::Entity::find()
            .filter(academic_year::Column::IsActive.eq(true))
            .order_by_desc(academic_year::Column::StartYear)
            .one(db)
            .await
            .map_err(ApiErr::internal)?
            .ok_or_else(|| ApiErr::unprocessable("No active academic year")),
    }
}

async fn insert_student(
    db: &DatabaseConnection,
    body: &CreateStudentRequest,
    user_id: uuid::Uuid,
    academic_year_id: i32,
) -> Result<student::Model, DbErr> {
    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;
    let created = student::ActiveModel {
        user_id: Set(user_id),
        roll_number: Set(body.roll_number.clone()),
        admission_date: Set(body.admission_date),
        parent_name: Set(body.parent_name.clone()),
        parent_phone: Set(body.parent_phone.clone()),
        parent_email: Set(body.parent_email.clone()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    student_class_assignment::ActiveModel {
        student_id: Set(created.id),
        section_id: Set(body.section_id),
        academic_year_id: Set(academic_year_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;
    Ok(created)
}
