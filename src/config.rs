use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Outbound mail settings. Delivery is only enabled when both `username`
/// and `password` are present.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub reset_link_base: String,
}

/// Credentials for an SMTP relay, resolved from [`MailConfig`].
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl MailConfig {
    pub fn smtp(&self) -> Option<SmtpSettings> {
        let username = self.username.clone()?;
        let password = self.password.clone()?;
        Some(SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            from: self.from.clone().unwrap_or_else(|| username.clone()),
            username,
            password,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    /// Return freshly issued reset tokens in the forgot-password response
    /// when no mail transport is configured. Development only.
    pub expose_reset_token: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;

        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "techstock".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "techstock-users".into()),
        };

        let smtp_port = match get("SMTP_PORT") {
            Some(v) => v
                .parse::<u16>()
                .with_context(|| format!("SMTP_PORT is not a valid port: {v}"))?,
            None => 587,
        };

        let mail = MailConfig {
            smtp_host: get("SMTP_HOST").unwrap_or_else(|| "smtp-mail.outlook.com".into()),
            smtp_port,
            username: get("EMAIL_USER"),
            password: get("EMAIL_PASS"),
            from: get("EMAIL_FROM"),
            reset_link_base: get("RESET_LINK_BASE")
                .unwrap_or_else(|| "http://localhost:3000/reset-password".into()),
        };

        let expose_reset_token = get("EXPOSE_RESET_TOKEN")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let production = get("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        if expose_reset_token && production {
            bail!("EXPOSE_RESET_TOKEN cannot be enabled when APP_ENV=production");
        }

        Ok(Self {
            database_url,
            jwt,
            mail,
            expose_reset_token,
        })
    }
}
