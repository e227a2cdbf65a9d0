use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};

use crate::admin::dto::*;
use crate::admin::jwt::TenantClaims;
use crate::admin::{ApiErr, AppState};
use crate::auth::{Auth, AuthError, NewUser};
use crate::collaborators::{Notification, NotificationKind};
use crate::entity::{academic_year, class_assignment, school, school_section, teacher};

pub async fn list_teachers(
    _tenant: TenantClaims,
    State(state): State<AppState>,
) -> Result<Json<Vec<TeacherResponse>>, ApiErr> {
    let db = state.router.connection::<teacher::Entity>()?;
    let teachers = teacher::Entity::find()
        .order_by_asc(teacher::Column::Id)
        .all(&db)
        .await
        .map_err(ApiErr::internal)?;

    let mut sections: HashMap<i32, Vec<i32>> = HashMap::new();
    for a in class_assignment::Entity::find()
        .filter(class_assignment::Column::TeacherId.is_not_null())
        .order_by_asc(class_assignment::Column::SectionId)
        .all(&db)
        .await
        .map_err(ApiErr::internal)?
    {
        if let Some(teacher_id) = a.teacher_id {
            sections.entry(teacher_id).or_default().push(a.section_id);
        }
    }

    Ok(Json(
        teachers
            .into_iter()
            .map(|t| {
                let assigned = sections.remove(&t.id).unwrap_or_default();
                TeacherResponse::new(t, assigned)
            })
            .collect(),
    ))
}

/// Creates the teacher's login in the control plane, then the teacher row
/// and its section assignments in the school database. If the school-side
/// write fails the login is deleted again.
pub async fn create_teacher(
    tenant: TenantClaims,
    State(state): State<AppState>,
    Json(body): Json<CreateTeacherRequest>,
) -> Result<(StatusCode, Json<TeacherResponse>), ApiErr> {
    if !tenant.claims.is_school_admin() {
        return Err(ApiErr::new(StatusCode::FORBIDDEN, "School admin access required"));
    }
    let db = state.router.connection::<teacher::Entity>()?;

    let section_ids: Vec<i32> = body
        .section_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let academic_year_id = if section_ids.is_empty() {
        None
    } else {
        for id in &section_ids {
            school_section::Entity::find_by_id(*id)
                .one(&db)
                .await
                .map_err(ApiErr::internal)?
                .ok_or_else(|| ApiErr::not_found(format!("Section {id} not found")))?;
        }
        Some(current_academic_year(&db, body.academic_year_id).await?)
    };

    let user = Auth::create_user(
        &state.db,
        &NewUser {
            user_name: body.user_name.clone(),
            email: body.email.clone(),
            password: body.password.clone(),
            role: "teacher",
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

    let created = match insert_teacher(&db, &body, user.id, &section_ids, academic_year_id).await {
        Ok(created) => created,
        Err(e) => {
            let user_name = user.user_name.clone();
            if let Err(cleanup) = user.delete(&state.db).await {
                tracing::error!(
                    user = %user_name,
                    error = %cleanup,
                    "failed to remove login after teacher insert failed; remove it manually"
                );
            }
            return Err(ApiErr::internal(e));
        }
    };
    tracing::info!(
        db = %tenant.db_key,
        teacher_id = created.id,
        user = %user.user_name,
        sections = section_ids.len(),
        "teacher created"
    );

    let school_name = school::Entity::find_by_id(tenant.school_id)
        .one(&state.db)
        .await
        .ok()
        .flatten()
        .map(|s| s.name);
    let welcome = Notification {
        kind: NotificationKind::Welcome,
        to: user.email.clone(),
        user_name: user.user_name.clone(),
        school_name,
        otp: None,
    };
    if let Err(e) = state.notifier.send(&welcome).await {
        tracing::warn!(user = %user.user_name, error = %e, "welcome notification failed");
    }

    Ok((
        StatusCode::CREATED,
        Json(TeacherResponse::new(created, section_ids)),
    ))
}

async fn current_academic_year(
    db: &DatabaseConnection,
    requested: Option<i32>,
) -> Result<i32, ApiErr> {
    let year = match requested {
        Some(id) => academic_year::Entity::find_by_id(id).one(db).await,
        None => {
            academic_year::Entity::find()
                .filter(academic_year::Column::IsActive.eq(true))
                .order_by_desc(academic_year::Column::StartYear)
                .one(db)
                .await
        }
    }
    .map_err(ApiErr::internal)?;
    match (year, requested) {
        (Some(y), _) => Ok(y.id),
        (None, Some(_)) => Err(ApiErr::not_found("Academic year not found")),
        (None, None) => Err(ApiErr::unprocessable("No active academic year")),
    }
}

async fn insert_teacher(
    db: &DatabaseConnection,
    body: &CreateTeacherRequest,
    user_id: uuid::Uuid,
    section_ids: &[i32],
    academic_year_id: Option<i32>,
) -> Result<teacher::Model, DbErr> {
    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;
    let created = teacher::ActiveModel {
        user_id: Set(user_id),
        qualification: Set(body.qualification.clone()),
        experience: Set(body.experience),
        joining_date: Set(body.joining_date),
        emergency_contact: Set(body.emergency_contact.clone()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    if let Some(year) = academic_year_id {
        for section_id in section_ids {
            class_assignment::ActiveModel {
                section_id: Set(*section_id),
                teacher_id: Set(Some(created.id)),
                academic_year_id: Set(year),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }
    txn.commit().await?;
    Ok(created)
}
