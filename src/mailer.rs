use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{MailConfig, MailTransport};

/// A rendered message with both plain-text and HTML bodies.
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Delivers mail through an HTTP relay, authenticating with the mail account.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    username: String,
    password: String,
    from: String,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build mail http client")?;
        Ok(Self {
            client,
            api_url: cfg.api_url.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            from: cfg.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let body = RelayRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
            html: &message.html,
        };
        self.client
            .post(&self.api_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .context("mail relay request")?
            .error_for_status()
            .context("mail relay rejected message")?;
        debug!(to = %message.to, subject = %message.subject, "mail sent");
        Ok(())
    }
}

/// Logs the message instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogMailer {
    from: String,
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        info!(
            from = %self.from,
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "mail delivery stub"
        );
        Ok(())
    }
}

pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    let mailer: Arc<dyn Mailer> = match cfg.transport {
        MailTransport::Http => Arc::new(HttpMailer::new(cfg)?),
        MailTransport::Log => Arc::new(LogMailer {
            from: cfg.from.clone(),
        }),
    };
    Ok(mailer)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn log_cfg() -> MailConfig {
        MailConfig {
            transport: MailTransport::Log,
            api_url: String::new(),
            username: String::new(),
            password: String::new(),
            from: "no-reply@localhost".into(),
        }
    }

    #[tokio::test]
    async fn log_mailer_accepts_messages() {
        let mailer = from_config(&log_cfg()).expect("log mailer");
        let msg = EmailMessage {
            to: "a@x.com".into(),
            subject: "Verify Email".into(),
            text: "hello".into(),
            html: "<p>hello</p>".into(),
        };
        mailer.send(&msg).await.expect("log mailer never fails");
    }

    #[tokio::test]
    async fn http_mailer_surfaces_transport_errors() {
        let cfg = MailConfig {
            transport: MailTransport::Http,
            // Nothing listens on the discard port.
            api_url: "http://127.0.0.1:9/send".into(),
            username: "robot".into(),
            password: "secret".into(),
            from: "robot@example.com".into(),
        };
        let mailer = HttpMailer::new(&cfg).expect("client builds");
        let msg = EmailMessage {
            to: "a@x.com".into(),
            subject: "s".into(),
            text: "t".into(),
            html: "h".into(),
        };
        let err = mailer.send(&msg).await.unwrap_err();
        assert!(err.to_string().contains("mail relay"));
    }
}
