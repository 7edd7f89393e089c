use std::collections::{BTreeMap, HashMap};

use axum::extract::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ApiJson, ApiResponse, ApiResult};
use crate::clients::{
    youtube::{extract_channel_id, ChannelInfo, VideoInfo},
    EmailMessage, GeminiClient, Mailer, YouTubeClient,
};
use crate::cms;
use crate::error::AppError;
use crate::AppState;

const RECENT_VIDEO_COUNT: u32 = 10;
const DEFAULT_SOURCE_LANGUAGE: &str = "한국어";

#[derive(Debug, Deserialize, ToSchema)]
pub struct FetchYoutubeRequest {
    pub channel_url: String,
    /// Overrides the server's key for this call
    pub youtube_api_key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct YoutubeData {
    pub channel: ChannelInfo,
    pub videos: Vec<VideoInfo>,
}

#[utoipa::path(
    post,
    path = "/functions/fetch-youtube-data",
    request_body = FetchYoutubeRequest,
    responses(
        (status = 200, description = "Channel statistics and recent uploads", body = ApiResponse<YoutubeData>),
        (status = 400, description = "Missing API key or unrecognised channel URL"),
        (status = 404, description = "Channel not found")
    )
)]
#[tracing::instrument(skip(state, req), fields(channel_url = %req.channel_url))]
pub async fn fetch_youtube_data(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FetchYoutubeRequest>,
) -> ApiResult<YoutubeData> {
    let api_key = req
        .youtube_api_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| state.config.youtube_api_key.clone())
        .ok_or_else(|| AppError::InvalidRequest("YouTube API key is required".to_string()))?;

    let channel_ref = extract_channel_id(&req.channel_url)
        .ok_or_else(|| AppError::InvalidRequest("Invalid YouTube channel URL".to_string()))?;

    let client = YouTubeClient::new(state.http_client.clone(), api_key);
    let channel = client.channel_info(&channel_ref).await?;
    let videos = client.recent_videos(&channel, RECENT_VIDEO_COUNT).await?;
    tracing::info!("Fetched {} videos for channel {}", videos.len(), channel.channel_id);

    Ok(ApiResponse::ok(YoutubeData { channel, videos }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: Option<String>,
    pub fields: Option<BTreeMap<String, String>>,
    pub target_language: String,
    #[serde(default = "default_source_language")]
    pub source_language: String,
}

fn default_source_language() -> String {
    DEFAULT_SOURCE_LANGUAGE.to_string()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Translation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

/// Translates either one text or a map of named fields
#[utoipa::path(
    post,
    path = "/functions/translate",
    request_body = TranslateRequest,
    responses(
        (status = 200, description = "Translated text or fields", body = ApiResponse<Translation>),
        (status = 400, description = "Nothing to translate"),
        (status = 500, description = "Gemini not configured or failed")
    )
)]
#[tracing::instrument(skip(state, req), fields(target = %req.target_language))]
pub async fn translate(State(state): State<AppState>, ApiJson(req): ApiJson<TranslateRequest>) -> ApiResult<Translation> {
    if req.target_language.trim().is_empty() {
        return Err(AppError::InvalidRequest("targetLanguage is required".to_string()));
    }
    let api_key = state
        .config
        .gemini_api_key
        .clone()
        .ok_or_else(|| AppError::InternalError("GEMINI_API_KEY is not configured".to_string()))?;
    let gemini = GeminiClient::new(state.http_client.clone(), api_key, state.config.gemini_model.clone());

    let translation = match (req.text, req.fields) {
        (_, Some(fields)) if !fields.is_empty() => Translation {
            translated_text: None,
            fields: Some(
                gemini
                    .translate_fields(&fields, &req.source_language, &req.target_language)
                    .await?,
            ),
        },
        (Some(text), _) if !text.trim().is_empty() => Translation {
            translated_text: Some(
                gemini
                    .translate_text(&text, &req.source_language, &req.target_language)
                    .await?,
            ),
            fields: None,
        },
        _ => return Err(AppError::InvalidRequest("text or fields is required".to_string())),
    };

    Ok(ApiResponse::ok(translation))
}

/// Either a ready message or a stored template plus its variables.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
    pub template_key: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmailSent {
    pub to: String,
    pub subject: String,
}

impl SendEmailRequest {
    fn into_direct(self) -> EmailMessage {
        EmailMessage {
            to: self.to,
            subject: self.subject.unwrap_or_default(),
            html: self.html.unwrap_or_default(),
            text: self.text,
        }
    }
}

#[utoipa::path(
    post,
    path = "/functions/send-email",
    request_body = SendEmailRequest,
    responses(
        (status = 200, description = "Handed to the mail relay", body = ApiResponse<EmailSent>),
        (status = 400, description = "Missing recipient, subject or body"),
        (status = 404, description = "Unknown template"),
        (status = 500, description = "Mail relay not configured or failed")
    )
)]
#[tracing::instrument(skip(state, req), fields(to = %req.to))]
pub async fn send_email(State(state): State<AppState>, ApiJson(req): ApiJson<SendEmailRequest>) -> ApiResult<EmailSent> {
    let relay_url = state
        .config
        .mail_relay_url
        .clone()
        .ok_or_else(|| AppError::InternalError("MAIL_RELAY_URL is not configured".to_string()))?;

    let message = match req.template_key.clone() {
        Some(key) => {
            let template = cms::get_template(state.biz()?, &key).await?;
            let rendered = template.render(&req.variables);
            EmailMessage {
                to: req.to,
                subject: rendered.subject,
                html: rendered.html,
                text: rendered.text,
            }
        }
        None => req.into_direct(),
    };

    Mailer::new(state.http_client.clone(), relay_url, state.config.mail_from.clone())
        .send(&message)
        .await?;

    Ok(ApiResponse::ok(EmailSent {
        to: message.to,
        subject: message.subject,
    }))
}
