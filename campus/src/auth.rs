use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use password_hash::SaltString;
use rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::entity::{app_user, role};
use crate::tenancy::is_unique_violation;

pub const PASSWORD_POLICY: &str = "Password must be at least 8 characters long and contain at least one uppercase letter, one lowercase letter, one number, and one special character.";

#[derive(Debug)]
pub enum AuthError {
    NotFound,
    InvalidPassword,
    Inactive,
    WeakPassword,
    UnknownRole(String),
    Conflict(String),
    Db(sea_orm::DbErr),
    Hash(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NotFound => write!(f, "User not found"),
            AuthError::InvalidPassword => write!(f, "Invalid password"),
            AuthError::Inactive => write!(f, "User is inactive"),
            AuthError::WeakPassword => write!(f, "{PASSWORD_POLICY}"),
            AuthError::UnknownRole(r) => write!(f, "Role '{r}' does not exist"),
            AuthError::Conflict(msg) => write!(f, "{msg}"),
            AuthError::Db(e) => write!(f, "Database error: {e}"),
            AuthError::Hash(e) => write!(f, "Hash error: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<sea_orm::DbErr> for AuthError {
    fn from(e: sea_orm::DbErr) -> Self {
        AuthError::Db(e)
    }
}

/// Fields for a new control-plane user.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub role: &'static str,
    pub school_id: Option<i32>,
    pub is_superuser: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

/// At least 8 characters with an uppercase letter, a lowercase letter, a
/// digit, and a character that is none of those.
pub fn check_password_policy(password: &str) -> Result<(), AuthError> {
    let ok = password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_ascii_alphanumeric());
    if ok { Ok(()) } else { Err(AuthError::WeakPassword) }
}

pub struct Auth {
    db: DatabaseConnection,
}

impl Auth {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Verify credentials and stamp `last_login_at`.
    pub async fn authenticate(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<app_user::Model, AuthError> {
        let user = self.find_by_user_name(user_name).await?;

        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        let hash =
            PasswordHash::new(&user.password_hash).map_err(|e| AuthError::Hash(e.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .map_err(|_| AuthError::InvalidPassword)?;

        let mut active: app_user::ActiveModel = user.clone().into();
        active.last_login_at = Set(Some(Utc::now().naive_utc()));
        let user = active.update(&self.db).await?;

        Ok(user)
    }

    /// Insert a user on `conn`, which may be an open transaction.
    pub async fn create_user<C: ConnectionTrait>(
        conn: &C,
        new: &NewUser,
    ) -> Result<app_user::Model, AuthError> {
        check_password_policy(&new.password)?;
        let role = role::Entity::find()
            .filter(role::Column::Name.eq(new.role))
            .one(conn)
            .await?
            .ok_or_else(|| AuthError::UnknownRole(new.role.to_string()))?;

        let password_hash = Self::hash_password(&new.password)?;
        let now = Utc::now().naive_utc();
        app_user::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_name: Set(new.user_name.clone()),
            email: Set(new.email.clone()),
            password_hash: Set(password_hash),
            role_id: Set(Some(role.id)),
            school_id: Set(new.school_id),
            is_superuser: Set(new.is_superuser),
            is_active: Set(true),
            first_name: Set(new.first_name.clone()),
            last_name: Set(new.last_name.clone()),
            phone_number: Set(new.phone_number.clone()),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::Conflict("Username already taken.".to_string())
            } else {
                AuthError::Db(e)
            }
        })
    }

    pub async fn create_superuser(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> Result<app_user::Model, AuthError> {
        let new = NewUser {
            user_name: user_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: "superadmin",
            school_id: None,
            is_superuser: true,
            first_name: None,
            last_name: None,
            phone_number: None,
        };
        Self::create_user(&self.db, &new).await
    }

    /// Replace a user's password after checking the policy.
    pub async fn set_password(
        &self,
        user: app_user::Model,
        new_password: &str,
    ) -> Result<app_user::Model, AuthError> {
        check_password_policy(new_password)?;
        let mut active: app_user::ActiveModel = user.into();
        active.password_hash = Set(Self::hash_password(new_password)?);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    /// Change the password of `user_id`, who must know the current one.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if old_password == new_password {
            return Err(AuthError::Conflict(
                "New password cannot be the same as old password.".to_string(),
            ));
        }
        let user = app_user::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AuthError::NotFound)?;
        let hash =
            PasswordHash::new(&user.password_hash).map_err(|e| AuthError::Hash(e.to_string()))?;
        Argon2::default()
            .verify_password(old_password.as_bytes(), &hash)
            .map_err(|_| AuthError::InvalidPassword)?;
        self.set_password(user, new_password).await?;
        Ok(())
    }

    pub async fn find_by_user_name(&self, user_name: &str) -> Result<app_user::Model, AuthError> {
        app_user::Entity::find()
            .filter(app_user::Column::UserName.eq(user_name))
            .one(&self.db)
            .await?
            .ok_or(AuthError::NotFound)
    }

    pub async fn count_users(&self) -> Result<u64, AuthError> {
        Ok(app_user::Entity::find().count(&self.db).await?)
    }

    /// Hash a plaintext password with Argon2id + a random salt.
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .to_string();
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    const PW: &str = "Str0ng!pass";

    async fn setup() -> Auth {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Auth::new(db)
    }

    fn teacher(name: &str) -> NewUser {
        NewUser {
            user_name: name.to_string(),
            email: format!("{name}@school.example"),
            password: PW.to_string(),
            role: "teacher",
            school_id: Some(1),
            is_superuser: false,
            first_name: Some("Ada".into()),
            last_name: None,
            phone_number: None,
        }
    }

    #[test]
    fn password_policy() {
        assert!(check_password_policy(PW).is_ok());
        for weak in ["short1!", "alllower1!", "ALLUPPER1!", "NoDigits!!", "NoSymbol11"] {
            assert!(
                matches!(check_password_policy(weak), Err(AuthError::WeakPassword)),
                "{weak} should be rejected"
            );
        }
    }

    #[test]
    fn test_hash_produces_argon2_format() {
        let hash = Auth::hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"), "Expected Argon2 PHC string, got: {hash}");
    }

    #[test]
    fn test_hash_unique_per_call() {
        let h1 = Auth::hash_password("same").unwrap();
        let h2 = Auth::hash_password("same").unwrap();
        assert_ne!(h1, h2);
    }

    #[tokio::test]
    async fn test_create_user_stores_hash_and_role() {
        let auth = setup().await;
        let user = Auth::create_user(auth.db(), &teacher("ada")).await.unwrap();
        assert_ne!(user.password_hash, PW);
        assert!(user.password_hash.starts_with("$argon2"));

        let role = role::Entity::find_by_id(user.role_id.unwrap())
            .one(auth.db())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(role.name, "teacher");
        assert_eq!(auth.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_user_name_is_conflict() {
        let auth = setup().await;
        Auth::create_user(auth.db(), &teacher("ada")).await.unwrap();
        let err = Auth::create_user(auth.db(), &teacher("ada")).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unknown_role_rejected() {
        let auth = setup().await;
        let mut new = teacher("ada");
        new.role = "janitor";
        let err = Auth::create_user(auth.db(), &new).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownRole(_)));
    }

    #[tokio::test]
    async fn test_authenticate_success_updates_last_login() {
        let auth = setup().await;
        Auth::create_user(auth.db(), &teacher("ada")).await.unwrap();
        let user = auth.authenticate("ada", PW).await.unwrap();
        assert_eq!(user.school_id, Some(1));
        assert!(user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_authenticate_failures() {
        let auth = setup().await;
        let user = Auth::create_user(auth.db(), &teacher("ada")).await.unwrap();

        assert!(matches!(
            auth.authenticate("ada", "wrong").await,
            Err(AuthError::InvalidPassword)
        ));
        assert!(matches!(
            auth.authenticate("nobody", PW).await,
            Err(AuthError::NotFound)
        ));

        let mut active: app_user::ActiveModel = user.into();
        active.is_active = Set(false);
        active.update(auth.db()).await.unwrap();
        assert!(matches!(
            auth.authenticate("ada", PW).await,
            Err(AuthError::Inactive)
        ));
    }

    #[tokio::test]
    async fn test_superuser_has_no_school() {
        let auth = setup().await;
        let root = auth.create_superuser("root", "root@campus.example", PW).await.unwrap();
        assert!(root.is_superuser);
        assert!(root.school_id.is_none());
    }

    #[tokio::test]
    async fn change_password_requires_the_old_one() {
        let auth = setup().await;
        let user = Auth::create_user(auth.db(), &teacher("ada")).await.unwrap();
        let next = "N3w!passw0rd";

        let err = auth.change_password(user.id, "Wr0ng!pass", next).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidPassword));
        let err = auth.change_password(user.id, PW, PW).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
        let err = auth.change_password(user.id, PW, "weak").await.unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword));

        auth.change_password(user.id, PW, next).await.unwrap();
        assert!(auth.authenticate("ada", next).await.is_ok());
        assert!(matches!(
            auth.authenticate("ada", PW).await.unwrap_err(),
            AuthError::InvalidPassword
        ));
    }
}
