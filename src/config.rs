use anyhow::{bail, Context};

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_seconds: i64,
}

/// How outbound verification and reset mail leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    /// POST to an HTTP mail relay with the account credentials.
    Http,
    /// Only emit a tracing event; for local development.
    Log,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub api_url: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub reset_ttl_minutes: i64,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;
        let frontend_url = required("FRONTEND_URL")?
            .trim_end_matches('/')
            .to_string();

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "mailauth".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "mailauth-users".into()),
            ttl_seconds: parsed("JWT_TTL_SECONDS", 360_000)?,
        };
        if jwt.ttl_seconds <= 0 {
            bail!("JWT_TTL_SECONDS must be positive");
        }

        let reset_ttl_minutes: i64 = parsed("RESET_TOKEN_TTL_MINUTES", 60)?;
        if reset_ttl_minutes <= 0 {
            bail!("RESET_TOKEN_TTL_MINUTES must be positive");
        }

        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed("PORT", 3000)?,
            frontend_url,
            reset_ttl_minutes,
            jwt,
            mail: MailConfig::from_env()?,
        })
    }

    /// Session cookies get `Secure` only when the client is served over https.
    pub fn cookie_secure(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

impl MailConfig {
    fn from_env() -> anyhow::Result<Self> {
        let transport = match std::env::var("MAIL_TRANSPORT")
            .unwrap_or_else(|_| "http".into())
            .to_lowercase()
            .as_str()
        {
            "http" => MailTransport::Http,
            "log" => MailTransport::Log,
            other => bail!("MAIL_TRANSPORT must be `http` or `log`, got `{other}`"),
        };

        match transport {
            MailTransport::Http => {
                let username = required("MAIL_USERNAME")
                    .context("mail account credentials are required to serve /auth")?;
                let password = required("MAIL_PASSWORD")
                    .context("mail account credentials are required to serve /auth")?;
                let from = std::env::var("MAIL_FROM").unwrap_or_else(|_| username.clone());
                Ok(Self {
                    transport,
                    api_url: required("MAIL_API_URL")?,
                    username,
                    password,
                    from,
                })
            }
            MailTransport::Log => {
                let username = std::env::var("MAIL_USERNAME").unwrap_or_default();
                let from = std::env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "no-reply@localhost".into());
                Ok(Self {
                    transport,
                    api_url: String::new(),
                    username,
                    password: String::new(),
                    from,
                })
            }
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{key} must be set"),
    }
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value `{v}`")),
        Err(_) => Ok(default),
    }
}
