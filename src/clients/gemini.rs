use std::collections::BTreeMap;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::strip_code_fence;
use crate::error::AppError;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        Some(text.trim().to_string()).filter(|t| !t.is_empty())
    }
}

fn text_prompt(text: &str, source: &str, target: &str) -> String {
    format!(
        "You are a professional translator. Translate the following text from {source} to {target}.\n\
         Keep the translation natural and accurate. Preserve any formatting, line breaks, and special characters.\n\
         Do not add any explanation or notes - only provide the translated text.\n\n\
         Text to translate:\n{text}"
    )
}

fn fields_prompt(fields: &BTreeMap<String, String>, source: &str, target: &str) -> Result<String, AppError> {
    let payload = serde_json::to_string_pretty(fields)?;
    Ok(format!(
        "You are a professional translator for influencer marketing campaigns. \
         Translate every value of the following JSON object from {source} to {target}. \
         Keep the keys unchanged and return only a JSON object with the same keys.\n\n{payload}"
    ))
}

/// Reads the model's JSON answer. Keys the model dropped keep their source text.
pub fn parse_translated_fields(
    raw: &str,
    source_fields: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, AppError> {
    let parsed: serde_json::Value = serde_json::from_str(strip_code_fence(raw))?;
    let object = parsed
        .as_object()
        .ok_or_else(|| AppError::Upstream("translation response is not a JSON object".to_string()))?;

    Ok(source_fields
        .iter()
        .map(|(key, original)| {
            let translated = match object.get(key).and_then(|v| v.as_str()) {
                Some(text) => text.to_string(),
                None => {
                    tracing::warn!("Translation missing field {}, keeping source text", key);
                    original.clone()
                }
            };
            (key.clone(), translated)
        })
        .collect())
}

/// Gemini `generateContent` client used for campaign translations.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: API_BASE.to_string(),
        }
    }

    async fn generate(&self, prompt: String) -> Result<String, AppError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": { "temperature": 0.3, "maxOutputTokens": 2048 }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("Gemini returned {}: {}", status, body)));
        }
        response
            .json::<GenerateResponse>()
            .await?
            .text()
            .ok_or_else(|| AppError::Upstream("Gemini returned an empty answer".to_string()))
    }

    #[tracing::instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn translate_text(&self, text: &str, source: &str, target: &str) -> Result<String, AppError> {
        self.generate(text_prompt(text, source, target)).await
    }

    /// Translates several named fields in one request.
    #[tracing::instrument(skip(self, fields), fields(count = fields.len()))]
    pub async fn translate_fields(
        &self,
        fields: &BTreeMap<String, String>,
        source: &str,
        target: &str,
    ) -> Result<BTreeMap<String, String>, AppError> {
        if fields.is_empty() {
            return Ok(BTreeMap::new());
        }
        let raw = self.generate(fields_prompt(fields, source, target)?).await?;
        parse_translated_fields(&raw, fields)
    }
}
