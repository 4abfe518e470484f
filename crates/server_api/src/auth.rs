use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{Role, User, UserId},
    protocol::{AuthSession, LoginRequest, RegisterRequest},
};
use storage::InsertOutcome;

use crate::{
    guarded, normalize_email, present, response::send_data_response, settle_insert, ApiContext,
    Handled, Reply, SESSION, USER,
};

const SUBJECT_PREFIX: &str = "user:";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Signs and checks the bearer tokens handed out by `register` and `login`.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn mint(&self, user_id: UserId) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: format!("{SUBJECT_PREFIX}{}", user_id.0),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// The user a token was minted for. Expired, tampered or foreign tokens
    /// yield `None`.
    pub fn verify(&self, token: &str) -> Option<UserId> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).ok()?;
        data.claims
            .sub
            .strip_prefix(SUBJECT_PREFIX)?
            .parse::<i64>()
            .ok()
            .map(UserId)
    }
}

/// Creates a student account with a password and logs it in.
pub async fn register(
    ctx: &ApiContext,
    tokens: &TokenIssuer,
    actor: Option<UserId>,
    req: RegisterRequest,
) -> Handled {
    guarded(ctx, actor, "Register user", async move {
        let (Some(email), Some(username), Some(password)) = (
            present(req.email),
            present(req.username),
            present(req.password),
        ) else {
            return Ok(ctx.missing_field(actor, &USER));
        };
        let email = normalize_email(&email);

        if let Some(existing) = ctx.storage.find_user_by_email(&email).await? {
            return ctx.conflict(actor, &USER, &existing);
        }

        let password_hash =
            tokio::task::spawn_blocking(move || password_auth::generate_hash(password)).await?;
        let outcome = ctx
            .storage
            .create_user_with_password(&email, &username, Role::Student, &password_hash)
            .await?;
        match outcome {
            InsertOutcome::Created(user) => session_reply(tokens, user),
            outcome => {
                settle_insert(
                    ctx,
                    actor,
                    &USER,
                    outcome,
                    ctx.storage.find_user_by_email(&email),
                )
                .await
            }
        }
    })
    .await
}

/// Unknown emails, password-less accounts and wrong passwords all answer
/// the same unauthorized reply.
pub async fn login(
    ctx: &ApiContext,
    tokens: &TokenIssuer,
    actor: Option<UserId>,
    req: LoginRequest,
) -> Handled {
    guarded(ctx, actor, "Log in", async move {
        let (Some(email), Some(password)) = (present(req.email), present(req.password)) else {
            return Ok(ctx.missing_field(actor, &SESSION));
        };
        let email = normalize_email(&email);

        let Some((user, Some(password_hash))) = ctx.storage.find_user_credentials(&email).await?
        else {
            return Ok(ctx.unauthorized(actor, &SESSION));
        };

        let verified = tokio::task::spawn_blocking(move || {
            password_auth::verify_password(password, &password_hash).is_ok()
        })
        .await?;
        if !verified {
            return Ok(ctx.unauthorized(actor, &SESSION));
        }

        session_reply(tokens, user)
    })
    .await
}

fn session_reply(tokens: &TokenIssuer, user: User) -> anyhow::Result<Reply> {
    let token = tokens.mint(user.id)?;
    let payload = serde_json::to_value(AuthSession { user, token })?;
    Ok(send_data_response(200, payload))
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
