use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;

use super::get_with_retry;
use crate::error::AppError;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

static CHANNEL_PATTERNS: Lazy<[(Regex, ChannelKind); 4]> = Lazy::new(|| {
    [
        (Regex::new(r"youtube\.com/channel/([^/?#]+)").unwrap(), ChannelKind::Id),
        (Regex::new(r"youtube\.com/@([^/?#]+)").unwrap(), ChannelKind::Handle),
        (Regex::new(r"youtube\.com/c/([^/?#]+)").unwrap(), ChannelKind::Custom),
        (Regex::new(r"youtube\.com/user/([^/?#]+)").unwrap(), ChannelKind::Username),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Id,
    Handle,
    Custom,
    Username,
}

/// Channel reference pulled out of a channel URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub kind: ChannelKind,
    pub value: String,
}

impl ChannelRef {
    /// Query parameter the channels endpoint needs for this reference.
    fn lookup_param(&self) -> (&'static str, String) {
        match self.kind {
            ChannelKind::Id => ("id", self.value.clone()),
            ChannelKind::Handle | ChannelKind::Custom => ("forHandle", format!("@{}", self.value)),
            ChannelKind::Username => ("forUsername", self.value.clone()),
        }
    }
}

pub fn extract_channel_id(url: &str) -> Option<ChannelRef> {
    CHANNEL_PATTERNS.iter().find_map(|(pattern, kind)| {
        pattern.captures(url).map(|caps| ChannelRef {
            kind: *kind,
            value: caps[1].to_string(),
        })
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub channel_name: String,
    pub thumbnail_url: Option<String>,
    pub description: String,
    pub subscriber_count: i64,
    pub video_count: i64,
    pub view_count: i64,
    #[serde(skip)]
    pub uploads_playlist: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct VideoInfo {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub duration: Option<String>,
    pub tags: Vec<String>,
}

// Wire types. The Data API returns counts as strings.

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.high.or(self.default).map(|t| t.url)
    }
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    subscriber_count: Option<String>,
    video_count: Option<String>,
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

fn count(raw: &Option<String>) -> i64 {
    raw.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    #[serde(default)]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
    #[serde(default)]
    content_details: ChannelContentDetails,
}

impl From<ChannelItem> for ChannelInfo {
    fn from(item: ChannelItem) -> Self {
        ChannelInfo {
            subscriber_count: count(&item.statistics.subscriber_count),
            video_count: count(&item.statistics.video_count),
            view_count: count(&item.statistics.view_count),
            channel_id: item.id,
            channel_name: item.snippet.title,
            description: item.snippet.description,
            thumbnail_url: item.snippet.thumbnails.best(),
            uploads_playlist: item.content_details.related_playlists.uploads,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Default, Deserialize)]
struct VideoDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
    #[serde(default)]
    content_details: VideoDetails,
}

impl From<VideoItem> for VideoInfo {
    fn from(item: VideoItem) -> Self {
        VideoInfo {
            view_count: count(&item.statistics.view_count),
            like_count: count(&item.statistics.like_count),
            comment_count: count(&item.statistics.comment_count),
            video_id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            thumbnail_url: item.snippet.thumbnails.best(),
            published_at: item.snippet.published_at,
            duration: item.content_details.duration,
            tags: item.snippet.tags,
        }
    }
}

/// YouTube Data API v3 client.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn list<T: DeserializeOwned>(&self, resource: &str, params: &[(&str, &str)]) -> Result<Vec<T>, AppError> {
        let url = format!("{}/{}", self.base_url, resource);
        let mut query = params.to_vec();
        query.push(("key", self.api_key.as_str()));
        let response = get_with_retry(&self.http, &url, &query).await?;
        Ok(response.json::<ListResponse<T>>().await?.items)
    }

    #[tracing::instrument(skip(self))]
    pub async fn channel_info(&self, channel: &ChannelRef) -> Result<ChannelInfo, AppError> {
        let (param, value) = channel.lookup_param();
        let items: Vec<ChannelItem> = self
            .list("channels", &[("part", "snippet,statistics,contentDetails"), (param, value.as_str())])
            .await?;
        items
            .into_iter()
            .next()
            .map(ChannelInfo::from)
            .ok_or_else(|| AppError::NotFound("Channel not found".to_string()))
    }

    /// Latest uploads, newest first, with per-video statistics.
    #[tracing::instrument(skip(self, channel), fields(channel_id = %channel.channel_id))]
    pub async fn recent_videos(&self, channel: &ChannelInfo, max_results: u32) -> Result<Vec<VideoInfo>, AppError> {
        let Some(uploads) = channel.uploads_playlist.as_deref() else {
            return Ok(Vec::new());
        };
        let max = max_results.clamp(1, 50).to_string();
        let playlist: Vec<PlaylistItem> = self
            .list(
                "playlistItems",
                &[("part", "contentDetails"), ("playlistId", uploads), ("maxResults", max.as_str())],
            )
            .await?;
        if playlist.is_empty() {
            return Ok(Vec::new());
        }

        let ids = playlist
            .iter()
            .map(|p| p.content_details.video_id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let videos: Vec<VideoItem> = self
            .list("videos", &[("part", "snippet,statistics,contentDetails"), ("id", ids.as_str())])
            .await?;
        Ok(videos.into_iter().map(VideoInfo::from).collect())
    }
}
