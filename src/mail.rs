//! Outgoing customer email.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email provider rejected the message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Resend HTTP API.
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    from: String,
}

impl ResendMailer {
    pub fn new(http: reqwest::Client, api_key: String, api_url: String, from: String) -> Self {
        Self {
            http,
            api_key,
            api_url,
            from,
        }
    }
}

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let response = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&ResendEmail {
                from: &self.from,
                to: [&message.to],
                subject: &message.subject,
                html: &message.html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }
        tracing::info!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}

/// Used when no email provider is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "email provider not configured; message logged only"
        );
        Ok(())
    }
}

pub fn mailer_from_config(config: &EmailConfig, http: reqwest::Client) -> Arc<dyn Mailer> {
    match &config.resend_api_key {
        Some(key) => Arc::new(ResendMailer::new(
            http,
            key.clone(),
            config.resend_api_url.clone(),
            config.from.clone(),
        )),
        None => {
            tracing::warn!("RESEND_API_KEY not set; emails will only be logged");
            Arc::new(LogMailer)
        }
    }
}

pub fn notification_email(to: &str, name: &str, title: &str, body: &str) -> EmailMessage {
    let html = format!(
        "<h2>Hello {}!</h2>\n<p>{}</p>\n<br/>\n<p>Thank you for choosing <strong>Farmland Deli</strong>.</p>",
        escape_html(display_name(name)),
        escape_html(body),
    );
    EmailMessage {
        to: to.to_string(),
        subject: title.to_string(),
        html,
    }
}

pub fn redemption_email(to: &str, name: &str, redeemed: i32, remaining: i32) -> EmailMessage {
    let html = format!(
        "<h2>Hello {}!</h2>\n\
         <p><strong>{redeemed}</strong> points were redeemed from your account.</p>\n\
         <p>You have <strong>{remaining}</strong> points left.</p>\n\
         <br/>\n<p>Thank you for choosing <strong>Farmland Deli</strong>.</p>",
        escape_html(display_name(name)),
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Points redemption - Farmland Deli".to_string(),
        html,
    }
}

fn display_name(name: &str) -> &str {
    let trimmed = name.trim();
    if trimmed.is_empty() { "customer" } else { trimmed }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
