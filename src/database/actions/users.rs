use std::time::Duration;

use log::info;
use sqlx::{Pool, Sqlite};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    error::{unique_violation, Error},
    schema::{Id, User},
};

const EMAIL_TAKEN: &str = "user with this email already exists.";

/// Fields a user can be created with besides the credentials.
#[derive(Debug, Clone)]
pub struct UserExtra {
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Default for UserExtra {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }
}

impl UserExtra {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Partial update of a user row; `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

/// Emails are stored trimmed and lowercased. Blank input has no normal form.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        return None;
    }
    Some(email.to_lowercase())
}

pub async fn get_user(email: &str, pool: &Pool<Sqlite>) -> Result<Option<User>, Error> {
    let Some(email) = normalize_email(email) else {
        return Ok(None);
    };

    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(user_id: Id, pool: &Pool<Sqlite>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn list_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, Error> {
    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Creates a user with a normalised email and a hashed password. Fails when
/// the email is missing or blank, or already taken.
pub async fn create_user(
    email: Option<&str>,
    password: &str,
    extra: UserExtra,
    pool: &Pool<Sqlite>,
) -> Result<User, Error> {
    let Some(email) = email.and_then(normalize_email) else {
        return Err(Error::validation("email", "Users must have an email address"));
    };

    if get_user(&email, pool).await?.is_some() {
        return Err(Error::validation("email", EMAIL_TAKEN));
    }

    let password = hash_password(password)?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, name, password, is_active, is_staff, is_superuser)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
    ",
    )
    .bind(&email)
    .bind(&extra.name)
    .bind(password)
    .bind(extra.is_active)
    .bind(extra.is_staff)
    .bind(extra.is_superuser)
    .fetch_one(pool)
    .await
    .map_err(|e| unique_violation(e, "email", EMAIL_TAKEN))?;

    info!("Created user {} ({})", user.id, user.email);
    Ok(user)
}

pub async fn create_superuser(
    email: Option<&str>,
    password: &str,
    extra: UserExtra,
    pool: &Pool<Sqlite>,
) -> Result<User, Error> {
    let extra = UserExtra {
        is_staff: true,
        is_superuser: true,
        ..extra
    };

    create_user(email, password, extra, pool).await
}

/// Resolves credentials to an active user. Every failure looks the same to
/// the caller.
pub async fn authenticate(email: &str, password: &str, pool: &Pool<Sqlite>) -> Result<User, Error> {
    let user = get_user(email, pool)
        .await?
        .ok_or(Error::InvalidCredentials)?;

    if !user.is_active || !verify_password(password, &user.password)? {
        return Err(Error::InvalidCredentials);
    }

    Ok(user)
}

pub async fn login_user(
    email: &str,
    password: &str,
    secret: &str,
    lifetime: Duration,
    pool: &Pool<Sqlite>,
) -> Result<String, Error> {
    let user = authenticate(email, password, pool).await?;
    generate_jwt_session(&user, secret, lifetime)
}

pub async fn update_user(
    user_id: Id,
    changes: UserChanges,
    pool: &Pool<Sqlite>,
) -> Result<User, Error> {
    let email = match changes.email.as_deref() {
        Some(email) => {
            let Some(email) = normalize_email(email) else {
                return Err(Error::validation("email", "This field may not be blank."));
            };
            if let Some(existing) = get_user(&email, pool).await? {
                if existing.id != user_id {
                    return Err(Error::validation("email", EMAIL_TAKEN));
                }
            }
            Some(email)
        }
        None => None,
    };

    let password = match changes.password.as_deref() {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let user: Option<User> = sqlx::query_as(
        "
        UPDATE users SET
            email = COALESCE(?, email),
            name = COALESCE(?, name),
            password = COALESCE(?, password),
            is_active = COALESCE(?, is_active),
            is_staff = COALESCE(?, is_staff),
            is_superuser = COALESCE(?, is_superuser)
        WHERE id = ?
        RETURNING *
    ",
    )
    .bind(email)
    .bind(changes.name)
    .bind(password)
    .bind(changes.is_active)
    .bind(changes.is_staff)
    .bind(changes.is_superuser)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| unique_violation(e, "email", EMAIL_TAKEN))?;

    user.ok_or(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    #[test]
    fn emails_are_lowercased() {
        assert_eq!(
            normalize_email(" fake@EmAiL.CoM ").as_deref(),
            Some("fake@email.com")
        );
        assert_eq!(normalize_email("   "), None);
    }

    #[tokio::test]
    async fn create_user_with_email() {
        let pool = pool().await;
        let user = create_user(Some("fake@email.com"), "password123", UserExtra::default(), &pool)
            .await
            .unwrap();

        assert_eq!(user.email, "fake@email.com");
        assert!(verify_password("password123", &user.password).unwrap());
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
    }

    #[tokio::test]
    async fn new_user_email_normalized() {
        let pool = pool().await;
        let user = create_user(Some("fake@EmAiL.CoM"), "whatever", UserExtra::default(), &pool)
            .await
            .unwrap();

        assert_eq!(user.email, "fake@email.com");
    }

    #[tokio::test]
    async fn missing_email_is_rejected() {
        let pool = pool().await;

        for email in [None, Some(""), Some("  ")] {
            let result = create_user(email, "whatever", UserExtra::default(), &pool).await;
            assert!(matches!(result, Err(Error::Validation(_))));
        }
        assert!(list_users(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let pool = pool().await;
        create_user(Some("a@b.com"), "password123", UserExtra::default(), &pool)
            .await
            .unwrap();

        let result = create_user(Some("A@B.com"), "password123", UserExtra::default(), &pool).await;
        let Err(Error::Validation(errors)) = result else {
            panic!("expected a validation error");
        };
        assert!(errors.get("email").is_some());
    }

    #[tokio::test]
    async fn superuser_gets_flags() {
        let pool = pool().await;
        let user = create_superuser(Some("admin@email.com"), "password123", UserExtra::default(), &pool)
            .await
            .unwrap();

        assert!(user.is_staff);
        assert!(user.is_superuser);
    }

    #[tokio::test]
    async fn authenticate_hides_failure_reason() {
        let pool = pool().await;
        create_user(Some("test@test.com"), "password123", UserExtra::default(), &pool)
            .await
            .unwrap();

        assert!(authenticate("TEST@test.com", "password123", &pool).await.is_ok());
        assert!(matches!(
            authenticate("test@test.com", "wrong", &pool).await,
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate("nobody@test.com", "password123", &pool).await,
            Err(Error::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn inactive_users_cannot_log_in() {
        let pool = pool().await;
        let user = create_user(Some("test@test.com"), "password123", UserExtra::default(), &pool)
            .await
            .unwrap();
        let changes = UserChanges {
            is_active: Some(false),
            ..UserChanges::default()
        };
        update_user(user.id, changes, &pool).await.unwrap();

        assert!(matches!(
            authenticate("test@test.com", "password123", &pool).await,
            Err(Error::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn update_rehashes_password_and_normalizes_email() {
        let pool = pool().await;
        let user = create_user(Some("test@test.com"), "password123", UserExtra::named("name"), &pool)
            .await
            .unwrap();

        let changes = UserChanges {
            email: Some("New@Mail.com".to_string()),
            password: Some("newpass123".to_string()),
            ..UserChanges::default()
        };
        let updated = update_user(user.id, changes, &pool).await.unwrap();

        assert_eq!(updated.email, "new@mail.com");
        assert_eq!(updated.name, "name");
        assert!(verify_password("newpass123", &updated.password).unwrap());
    }

    #[tokio::test]
    async fn update_cannot_steal_email() {
        let pool = pool().await;
        create_user(Some("taken@test.com"), "password123", UserExtra::default(), &pool)
            .await
            .unwrap();
        let user = create_user(Some("me@test.com"), "password123", UserExtra::default(), &pool)
            .await
            .unwrap();

        let changes = UserChanges {
            email: Some("taken@test.com".to_string()),
            ..UserChanges::default()
        };
        assert!(matches!(
            update_user(user.id, changes, &pool).await,
            Err(Error::Validation(_))
        ));
    }
}
