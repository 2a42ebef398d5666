use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use helpmate_auth::{AuthError, Authenticator, NewAccount};
use helpmate_config::AuthConfig;
use helpmate_database::{
    timestamp, NewSubscription, PaymentCycle, Plan, SubscriptionRepository, SubscriptionStatus,
    MIGRATOR,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::str::FromStr;
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn default_auth_config() -> AuthConfig {
    AuthConfig {
        session_ttl_seconds: 3_600,
        min_password_length: 6,
    }
}

fn account(email: &str) -> NewAccount {
    NewAccount {
        name: "Alice Owner".into(),
        email: email.into(),
        password: "s3cret!".into(),
        phone: None,
        business_name: Some("Alice's Bakery".into()),
    }
}

struct TestContext {
    pool: SqlitePool,
    authenticator: Authenticator,
    _temp_dir: TempDir,
    config: AuthConfig,
}

impl TestContext {
    async fn new(config: AuthConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("auth.sqlite");
        let db_url = format!("sqlite://{}", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;

        let authenticator = Authenticator::new(pool.clone(), config.clone());

        Ok(Self {
            pool,
            authenticator,
            _temp_dir: temp_dir,
            config,
        })
    }

    async fn new_default() -> TestResult<Self> {
        Self::new(default_auth_config()).await
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}

#[tokio::test]
async fn register_persists_user_and_password_identity() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let (user, session) = ctx.authenticator().register(account("alice@example.com")).await?;
    assert_eq!(user.name, "Alice Owner");
    assert_eq!(user.business_name.as_deref(), Some("Alice's Bakery"));
    assert!(!user.is_admin);
    assert_eq!(session.user_id, user.id);

    let identity =
        sqlx::query("SELECT provider, provider_uid, secret FROM user_identities WHERE user_id = ?")
            .bind(user.id)
            .fetch_one(ctx.pool())
            .await?;

    let provider: String = identity.get("provider");
    let provider_uid: String = identity.get("provider_uid");
    let secret: String = identity.get("secret");

    assert_eq!(provider, "password");
    assert_eq!(provider_uid, "alice@example.com");
    assert!(secret.starts_with("$argon2"), "secret must be an argon2 hash");
    argon2::password_hash::PasswordHash::new(&secret)?;

    Ok(())
}

#[tokio::test]
async fn register_normalizes_email_and_rejects_duplicates() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator().register(account("Alice@Example.com ")).await?;

    let err = ctx
        .authenticator()
        .register(account("alice@example.com"))
        .await
        .expect_err("expected duplicate email to fail");
    assert!(matches!(err, AuthError::UserExists));

    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(user_count, 1, "no additional users should be created");

    Ok(())
}

#[tokio::test]
async fn register_validates_fields() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let mut bad_email = account("not-an-email");
    bad_email.email = "not-an-email".into();
    assert!(matches!(
        ctx.authenticator().register(bad_email).await,
        Err(AuthError::Validation(_))
    ));

    let mut short_password = account("bob@example.com");
    short_password.password = "12345".into();
    assert!(matches!(
        ctx.authenticator().register(short_password).await,
        Err(AuthError::Validation(_))
    ));

    let mut bad_phone = account("carol@example.com");
    bad_phone.phone = Some("12-34".into());
    assert!(matches!(
        ctx.authenticator().register(bad_phone).await,
        Err(AuthError::Validation(_))
    ));

    let mut no_name = account("dave@example.com");
    no_name.name = "   ".into();
    assert!(matches!(
        ctx.authenticator().register(no_name).await,
        Err(AuthError::Validation(_))
    ));

    let mut good_phone = account("erin@example.com");
    good_phone.phone = Some("9876543210".into());
    let (user, _) = ctx.authenticator().register(good_phone).await?;
    assert_eq!(user.phone.as_deref(), Some("9876543210"));

    Ok(())
}

#[tokio::test]
async fn login_returns_session_for_valid_credentials() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator().register(account("alice@example.com")).await?;

    let (user, session) = ctx
        .authenticator()
        .login("alice@example.com", "s3cret!")
        .await?;
    assert_eq!(user.email, "alice@example.com");

    let ttl = Duration::seconds(ctx.config.session_ttl_seconds as i64);
    let remaining = session.expires_at - Utc::now();
    assert!(
        (remaining - ttl).num_seconds().abs() <= 2,
        "session ttl should respect configuration"
    );

    let stored_expires: String =
        sqlx::query_scalar("SELECT expires_at FROM sessions WHERE token = ?")
            .bind(&session.token)
            .fetch_one(ctx.pool())
            .await?;
    let parsed = DateTime::parse_from_rfc3339(&stored_expires)?.with_timezone(&Utc);
    assert!((parsed - session.expires_at).num_milliseconds().abs() <= 1);

    let decoded = URL_SAFE_NO_PAD.decode(&session.token)?;
    assert_eq!(decoded.len(), 32);

    Ok(())
}

#[tokio::test]
async fn login_rejects_wrong_password_and_unknown_email() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator().register(account("alice@example.com")).await?;

    let wrong = ctx.authenticator().login("alice@example.com", "nope-nope").await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

    let unknown = ctx.authenticator().login("zed@example.com", "s3cret!").await;
    assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));

    let empty = ctx.authenticator().login("", "").await;
    assert!(matches!(empty, Err(AuthError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn authenticate_token_resolves_user_and_logout_revokes() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let (user, session) = ctx.authenticator().register(account("alice@example.com")).await?;

    let (resolved, _) = ctx.authenticator().authenticate_token(&session.token).await?;
    assert_eq!(resolved.public_id, user.public_id);

    ctx.authenticator().logout(&session.token).await?;
    let err = ctx
        .authenticator()
        .authenticate_token(&session.token)
        .await
        .expect_err("logged out token must be rejected");
    assert!(matches!(err, AuthError::SessionNotFound));

    Ok(())
}

#[tokio::test]
async fn expired_tokens_are_rejected_and_removed() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let (_, session) = ctx.authenticator().register(account("alice@example.com")).await?;

    sqlx::query("UPDATE sessions SET expires_at = ? WHERE token = ?")
        .bind("2000-01-01T00:00:00.000Z")
        .bind(&session.token)
        .execute(ctx.pool())
        .await?;

    let err = ctx
        .authenticator()
        .authenticate_token(&session.token)
        .await
        .expect_err("expired token must be rejected");
    assert!(matches!(err, AuthError::SessionExpired));

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE token = ?")
        .bind(&session.token)
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(remaining, 0);

    Ok(())
}

#[tokio::test]
async fn prune_expired_sessions_keeps_live_ones() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let (_, live) = ctx.authenticator().register(account("alice@example.com")).await?;
    let (_, stale) = ctx.authenticator().login("alice@example.com", "s3cret!").await?;

    sqlx::query("UPDATE sessions SET expires_at = ? WHERE token = ?")
        .bind("2000-01-01T00:00:00.000Z")
        .bind(&stale.token)
        .execute(ctx.pool())
        .await?;

    assert_eq!(ctx.authenticator().prune_expired_sessions().await?, 1);
    ctx.authenticator().authenticate_token(&live.token).await?;

    Ok(())
}

#[tokio::test]
async fn user_profile_derives_subscription_state() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let (user, _) = ctx.authenticator().register(account("alice@example.com")).await?;

    let profile = ctx.authenticator().user_profile(user.id).await?;
    assert!(!profile.subscription_active);
    assert!(profile.subscription_plan.is_none());

    SubscriptionRepository::new(ctx.pool().clone())
        .upsert(&NewSubscription {
            user_id: user.id,
            plan: Plan::Premium,
            payment_cycle: PaymentCycle::Yearly,
            status: SubscriptionStatus::Active,
            start_date: timestamp(),
            end_date: None,
            chat_limit: None,
            had_trial: false,
        })
        .await?;

    let profile = ctx.authenticator().user_profile(user.id).await?;
    assert!(profile.subscription_active);
    assert_eq!(profile.subscription_plan, Some(Plan::Premium));

    let json = serde_json::to_value(&profile)?;
    assert_eq!(json["id"], user.public_id);
    assert_eq!(json["businessName"], "Alice's Bakery");
    assert_eq!(json["subscriptionPlan"], "premium");
    assert!(json.get("password").is_none());

    Ok(())
}
