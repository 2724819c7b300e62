//! Outbound parent notifications over a JSON email API.

pub mod templates;

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::EmailConfig;

pub use templates::EmailContent;

#[derive(Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    sender: String,
    reply_to: Option<String>,
    enabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}

impl EmailClient {
    pub fn new(cfg: &EmailConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("failed to build email HTTP client")?;

        Ok(Self {
            http,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            token: cfg.api_token.clone(),
            sender: cfg.sender.clone(),
            reply_to: cfg.reply_to.clone(),
            enabled: cfg.enabled,
        })
    }

    pub async fn send(&self, to: &str, content: &EmailContent) -> Result<()> {
        if !self.enabled {
            tracing::info!("Email delivery disabled, skipping '{}' to {}", content.subject, to);
            return Ok(());
        }

        let body = SendEmailRequest {
            from: &self.sender,
            to,
            reply_to: self.reply_to.as_deref(),
            subject: &content.subject,
            html_body: &content.html,
            text_body: &content.text,
        };

        self.http
            .post(format!("{}/email", self.base_url))
            .header("X-Email-Api-Token", &self.token)
            .json(&body)
            .send()
            .await
            .context("email API request failed")?
            .error_for_status()
            .context("email API rejected the message")?;

        tracing::info!("Email '{}' sent to {}", content.subject, to);
        Ok(())
    }

    /// Fire-and-forget: delivery failures are logged, never returned.
    pub fn send_in_background(&self, to: String, content: EmailContent) {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send(&to, &content).await {
                tracing::error!("Failed to send email to {}: {:#}", to, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str, enabled: bool) -> EmailConfig {
        EmailConfig {
            enabled,
            api_base_url: base_url.to_string(),
            api_token: "test-token".to_string(),
            sender: "noreply@cifixlearn.online".to_string(),
            reply_to: Some("help@cifixlearn.online".to_string()),
            timeout_ms: 2_000,
        }
    }

    fn content() -> EmailContent {
        EmailContent {
            subject: "Hello".to_string(),
            html: "<p>Hello</p>".to_string(),
            text: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn sends_json_to_email_api() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/email"))
            .and(header("X-Email-Api-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = EmailClient::new(&config(&server.uri(), true)).unwrap();
        client.send("parent@example.com", &content()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["From"], "noreply@cifixlearn.online");
        assert_eq!(body["To"], "parent@example.com");
        assert_eq!(body["ReplyTo"], "help@cifixlearn.online");
        assert_eq!(body["Subject"], "Hello");
        assert_eq!(body["TextBody"], "Hello");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/email"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = EmailClient::new(&config(&server.uri(), true)).unwrap();
        assert!(client.send("parent@example.com", &content()).await.is_err());
    }

    #[tokio::test]
    async fn disabled_client_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = EmailClient::new(&config(&server.uri(), false)).unwrap();
        client.send("parent@example.com", &content()).await.unwrap();
    }
}
