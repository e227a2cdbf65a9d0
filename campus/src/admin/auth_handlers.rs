use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::auth::{AuthError, check_password_policy};
use crate::collaborators::{Notification, NotificationKind};
use crate::entity::{app_user, role};

use super::{
    ApiErr, AppState,
    dto::{
        ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse,
        PasswordResetConfirm, PasswordResetRequest, UserResponse,
    },
    jwt::{AuthClaims, Claims, encode_jwt},
};

async fn role_name(db: &DatabaseConnection, user: &app_user::Model) -> Result<Option<String>, ApiErr> {
    let Some(role_id) = user.role_id else {
        return Ok(None);
    };
    Ok(role::Entity::find_by_id(role_id)
        .one(db)
        .await
        .map_err(ApiErr::internal)?
        .map(|r| r.name))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiErr> {
    let user = state
        .auth
        .authenticate(&body.username, &body.password)
        .await
        .map_err(|e| match e {
            AuthError::NotFound | AuthError::InvalidPassword | AuthError::Inactive => {
                ApiErr::new(StatusCode::UNAUTHORIZED, "Invalid credentials")
            }
            other => ApiErr::internal(other),
        })?;

    let role = role_name(&state.db, &user).await?;
    let exp = (Utc::now().timestamp() as u64) + state.jwt_expiry_hours * 3600;
    let claims = Claims {
        sub: user.id,
        username: user.user_name.clone(),
        role: role.clone(),
        is_superuser: user.is_superuser,
        school_id: user.school_id,
        exp,
    };

    let token = encode_jwt(&claims, &state.jwt_secret).map_err(ApiErr::internal)?;
    tracing::info!(user = %user.user_name, school_id = ?user.school_id, "login");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::new(user, role),
    }))
}

pub async fn me(
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiErr> {
    let user = app_user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("User not found"))?;

    let role = role_name(&state.db, &user).await?;
    Ok(Json(UserResponse::new(user, role)))
}

pub async fn change_password(
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiErr> {
    state
        .auth
        .change_password(claims.sub, &body.old_password, &body.new_password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidPassword => ApiErr::unprocessable("Old password is incorrect."),
            AuthError::WeakPassword | AuthError::Conflict(_) => {
                ApiErr::unprocessable(e.to_string())
            }
            AuthError::NotFound => ApiErr::not_found("User not found"),
            other => ApiErr::internal(other),
        })?;
    tracing::info!(user = %claims.username, "password changed");
    Ok(Json(MessageResponse::new("Password changed successfully.")))
}

/// Send a one-time reset code to the user's email.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiErr> {
    let user = state
        .auth
        .find_by_user_name(&body.username)
        .await
        .map_err(|e| match e {
            AuthError::NotFound => ApiErr::not_found("User does not exist."),
            other => ApiErr::internal(other),
        })?;
    if !user.is_active {
        return Err(ApiErr::not_found("User does not exist."));
    }

    let code = state.reset_codes.issue(&user.user_name);
    let notification = Notification {
        kind: NotificationKind::PasswordReset,
        to: user.email.clone(),
        user_name: user.user_name.clone(),
        school_name: None,
        otp: Some(code),
    };
    if let Err(e) = state.notifier.send(&notification).await {
        tracing::error!(user = %user.user_name, error = %e, "password reset code not delivered");
        return Err(ApiErr::new(
            StatusCode::BAD_GATEWAY,
            "Failed to send password reset code.",
        ));
    }
    tracing::info!(user = %user.user_name, "password reset code sent");
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new("Password reset code has been sent to your email.")),
    ))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetConfirm>,
) -> Result<Json<MessageResponse>, ApiErr> {
    check_password_policy(&body.new_password).map_err(|e| ApiErr::unprocessable(e.to_string()))?;
    if !state.reset_codes.redeem(&body.username, &body.otp) {
        return Err(ApiErr::new(
            StatusCode::BAD_REQUEST,
            "Reset code has expired or is invalid.",
        ));
    }
    let user = state
        .auth
        .find_by_user_name(&body.username)
        .await
        .map_err(|e| match e {
            AuthError::NotFound => ApiErr::not_found("User does not exist."),
            other => ApiErr::internal(other),
        })?;
    let user = state
        .auth
        .set_password(user, &body.new_password)
        .await
        .map_err(ApiErr::internal)?;
    tracing::info!(user = %user.user_name, "password reset");
    Ok(Json(MessageResponse::new("Password changed successfully.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{api_router, test_support};
    use crate::collaborators::{CollaboratorError, Notifier};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<Notification>>);

    #[async_trait]
    impl Notifier for Outbox {
        async fn send(&self, n: &Notification) -> Result<(), CollaboratorError> {
            self.0.lock().unwrap().push(n.clone());
            Ok(())
        }
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn login_status(app: &axum::Router, password: &str) -> StatusCode {
        app.clone()
            .oneshot(post_json(
                "/api/v1/auth/login",
                serde_json::json!({"username": "root", "password": password}),
            ))
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn login_then_me() {
        let state = test_support::state().await;
        state
            .auth
            .create_superuser("root", "root@campus.example", test_support::PASSWORD)
            .await
            .unwrap();
        let app = api_router(state, &[]);

        let body = serde_json::json!({"username": "root", "password": test_support::PASSWORD});
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = test_support::json_body(resp).await;
        assert_eq!(json["user"]["role"], "superadmin");
        let token = json["token"].as_str().unwrap().to_string();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/me")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = test_support::json_body(resp).await;
        assert_eq!(json["username"], "root");
        assert_eq!(json["is_superuser"], true);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let state = test_support::state().await;
        state
            .auth
            .create_superuser("root", "root@campus.example", test_support::PASSWORD)
            .await
            .unwrap();
        let body = serde_json::json!({"username": "root", "password": "nope"});
        let resp = api_router(state, &[])
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn password_reset_with_emailed_code() {
        let mut state = test_support::state().await;
        let outbox = Arc::new(Outbox::default());
        state.notifier = outbox.clone();
        state
            .auth
            .create_superuser("root", "root@campus.example", test_support::PASSWORD)
            .await
            .unwrap();
        let app = api_router(state, &[]);

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/v1/auth/password-reset",
                serde_json::json!({"username": "root"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let sent = outbox.0.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::PasswordReset);
        assert_eq!(sent[0].to, "root@campus.example");
        let code = sent[0].otp.clone().unwrap();

        let next = "R3set!pass";
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/v1/auth/password-reset/confirm",
                serde_json::json!({"username": "root", "otp": "000000", "new_password": next}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let confirm = serde_json::json!({"username": "root", "otp": code, "new_password": next});
        let resp = app
            .clone()
            .oneshot(post_json("/api/v1/auth/password-reset/confirm", confirm.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(login_status(&app, next).await, StatusCode::OK);
        assert_eq!(login_status(&app, test_support::PASSWORD).await, StatusCode::UNAUTHORIZED);

        // the code is spent
        let resp = app
            .oneshot(post_json("/api/v1/auth/password-reset/confirm", confirm))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn password_reset_for_unknown_user_sends_nothing() {
        let mut state = test_support::state().await;
        let outbox = Arc::new(Outbox::default());
        state.notifier = outbox.clone();
        let resp = api_router(state, &[])
            .oneshot(post_json(
                "/api/v1/auth/password-reset",
                serde_json::json!({"username": "ghost"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(outbox.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn change_password_for_signed_in_user() {
        let state = test_support::state().await;
        let root = state
            .auth
            .create_superuser("root", "root@campus.example", test_support::PASSWORD)
            .await
            .unwrap();
        let app = api_router(state, &[]);
        let claims = Claims {
            sub: root.id,
            username: "root".into(),
            role: Some("superadmin".into()),
            is_superuser: true,
            school_id: None,
            exp: Utc::now().timestamp() as u64 + 3600,
        };
        let bearer = format!("Bearer {}", encode_jwt(&claims, test_support::JWT_SECRET).unwrap());
        let change = |old: &str, new: &str| {
            Request::builder()
                .method(Method::PUT)
                .uri("/api/v1/auth/password")
                .header("Authorization", bearer.clone())
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({"old_password": old, "new_password": new}).to_string(),
                ))
                .unwrap()
        };

        let resp = app
            .clone()
            .oneshot(change("Wr0ng!pass", "N3w!passw0rd"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = app
            .clone()
            .oneshot(change(test_support::PASSWORD, "N3w!passw0rd"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(login_status(&app, "N3w!passw0rd").await, StatusCode::OK);
    }
}
