use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse,
            PublicUser, RegisterRequest, ResetPasswordRequest,
        },
        error::AuthError,
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_dummy, verify_password},
        repo::StoreError,
        repo_types::{NewUser, User},
        reset_token::{epoch_millis, ResetTicket},
    },
    mail::{password_reset_mail, MailError},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<User, AuthError> {
    let email = normalize_email(&req.email);
    if email.is_empty()
        || req.password.is_empty()
        || blank(&req.name)
        || blank(&req.phone)
        || blank(&req.city)
    {
        return Err(AuthError::Validation(
            "Email, password, name, phone and city are required",
        ));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Validation("Invalid email"));
    }

    let password_hash = hash_password(&req.password).await?;
    let new_user = NewUser {
        email,
        password_hash,
        name: req.name.trim().to_string(),
        phone: req.phone.trim().to_string(),
        city: req.city.trim().to_string(),
    };

    let user = state.users.insert(new_user).await.map_err(|e| {
        if matches!(e, StoreError::DuplicateEmail) {
            warn!("email already registered");
        }
        AuthError::from(e)
    })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Unknown email and wrong password fail identically.
pub async fn login(state: &AppState, req: LoginRequest) -> Result<LoginResponse, AuthError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AuthError::Validation("Email and password are required"));
    }

    let user = match state.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            verify_dummy(&req.password).await;
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !verify_password(&req.password, &user.password_hash).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = JwtKeys::from_ref(state).sign(&user)?;

    info!(user_id = %user.id, "user logged in");
    Ok(LoginResponse {
        message: "Login successful".into(),
        token,
        role: user.role,
    })
}

pub async fn forgot_password(
    state: &AppState,
    req: ForgotPasswordRequest,
    now: OffsetDateTime,
) -> Result<ForgotPasswordResponse, AuthError> {
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(AuthError::Validation("Email is required"));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "password reset for unknown email");
        return Err(AuthError::NotFound);
    };

    let ticket = ResetTicket::issue(now);
    state
        .users
        .set_reset_token(user.id, &ticket.token, ticket.expires_at_ms)
        .await?;
    info!(user_id = %user.id, expires_at_ms = ticket.expires_at_ms, "reset token issued");

    let Some(mailer) = state.mailer.as_ref() else {
        if state.config.expose_reset_token {
            warn!(user_id = %user.id, "email not configured; returning reset token in response");
            return Ok(ForgotPasswordResponse {
                message: "Password reset token generated (email not configured).".into(),
                token: Some(ticket.token),
                error: None,
            });
        }
        warn!(user_id = %user.id, "email not configured; reset email not sent");
        return Ok(ForgotPasswordResponse {
            message: "Password reset token generated, but email delivery is not configured."
                .into(),
            token: None,
            error: None,
        });
    };

    let mail = password_reset_mail(
        &user.email,
        &state.config.mail.reset_link_base,
        &ticket.token,
    );
    match mailer.send(&mail).await {
        Ok(()) => Ok(ForgotPasswordResponse {
            message: "Password reset email sent".into(),
            token: None,
            error: None,
        }),
        Err(MailError::Authentication(reason)) => {
            warn!(error = %reason, "email authentication failed; reset email not sent");
            Ok(ForgotPasswordResponse {
                message: "Password reset initiated. Email service rejected its credentials."
                    .into(),
                token: None,
                error: Some("Email service unavailable - authentication failed".into()),
            })
        }
        Err(e) => Err(AuthError::EmailTransport(e)),
    }
}

pub async fn reset_password(
    state: &AppState,
    token: &str,
    req: ResetPasswordRequest,
    now: OffsetDateTime,
) -> Result<(), AuthError> {
    if req.password.is_empty() {
        return Err(AuthError::Validation("Password is required"));
    }

    let Some(user) = state
        .users
        .find_by_reset_token(token, epoch_millis(now))
        .await?
    else {
        warn!("invalid or expired reset token");
        return Err(AuthError::InvalidOrExpiredToken);
    };

    let password_hash = hash_password(&req.password).await?;
    // Lost the race against another reset using the same token.
    if !state
        .users
        .consume_reset_token(user.id, token, &password_hash)
        .await?
    {
        warn!(user_id = %user.id, "reset token consumed concurrently");
        return Err(AuthError::InvalidOrExpiredToken);
    }

    info!(user_id = %user.id, "password reset");
    Ok(())
}

pub async fn profile(state: &AppState, auth: &AuthUser) -> Result<PublicUser, AuthError> {
    match state.users.find_by_id(auth.id).await? {
        Some(user) => Ok(user.into()),
        None => {
            warn!(user_id = %auth.id, "token subject no longer exists");
            Err(AuthError::Unauthorized("User not found"))
        }
    }
}

/// Admin lookup of any account's public profile.
pub async fn user_by_id(state: &AppState, id: Uuid) -> Result<PublicUser, AuthError> {
    state
        .users
        .find_by_id(id)
        .await?
        .map(PublicUser::from)
        .ok_or(AuthError::NotFound)
}
