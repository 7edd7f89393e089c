use reqwest::Client;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

impl EmailMessage {
    pub fn validate(&self) -> Result<(), AppError> {
        let to = self.to.trim();
        if to.is_empty() || !to.contains('@') {
            return Err(AppError::InvalidRequest("수신자 이메일이 올바르지 않습니다.".to_string()));
        }
        if self.subject.trim().is_empty() || self.html.trim().is_empty() {
            return Err(AppError::InvalidRequest("제목과 본문이 필요합니다.".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

/// Posts messages to an HTTP mail relay. Sends are never retried.
#[derive(Debug, Clone)]
pub struct Mailer {
    http: Client,
    relay_url: String,
    from: String,
}

impl Mailer {
    pub fn new(http: Client, relay_url: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            http,
            relay_url: relay_url.into(),
            from: from.into(),
        }
    }

    #[tracing::instrument(skip(self, message), fields(to = %message.to))]
    pub async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        message.validate()?;
        let response = self
            .http
            .post(&self.relay_url)
            .json(&RelayPayload {
                from: &self.from,
                to: message.to.trim(),
                subject: &message.subject,
                html: &message.html,
                text: message.text.as_deref(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("mail relay returned {}: {}", status, body)));
        }
        tracing::info!("Email '{}' sent", message.subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "캠페인 선정 안내".to_string(),
            html: "<p>축하합니다</p>".to_string(),
            text: None,
        }
    }

    #[test]
    fn validates_recipient_and_body() {
        assert!(message("creator@example.com").validate().is_ok());
        assert!(message("not-an-address").validate().is_err());
        let mut empty = message("a@b.co");
        empty.html = String::new();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn relay_payload_omits_missing_text() {
        let payload = RelayPayload {
            from: "noreply@cnec.co.kr",
            to: "a@b.co",
            subject: "s",
            html: "<p/>",
            text: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("text").is_none());
        assert_eq!(value["from"], "noreply@cnec.co.kr");
    }
}
