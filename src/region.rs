use std::{collections::HashMap, fmt, sync::Arc};

use sea_orm::{Database, DatabaseConnection};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{config::Config, error::AppError};

/// A regional Supabase project. Every region has its own Postgres database
/// with a slightly different schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Korea,
    Japan,
    Us,
    Taiwan,
    Biz,
}

impl Region {
    pub const ALL: [Region; 5] = [Region::Korea, Region::Japan, Region::Us, Region::Taiwan, Region::Biz];

    /// Regions that host creator profiles, submissions and point ledgers.
    pub const CREATOR_REGIONS: [Region; 3] = [Region::Korea, Region::Japan, Region::Us];

    /// Campaign-hosting regions used for revenue rollups.
    pub const CAMPAIGN_REGIONS: [Region; 4] = [Region::Korea, Region::Japan, Region::Us, Region::Taiwan];

    /// Strict lookup by name or alias.
    pub fn from_name(name: &str) -> Option<Region> {
        match name.trim().to_ascii_lowercase().as_str() {
            "korea" | "kr" => Some(Region::Korea),
            "japan" | "jp" => Some(Region::Japan),
            "us" | "usa" => Some(Region::Us),
            "taiwan" | "tw" => Some(Region::Taiwan),
            "biz" => Some(Region::Biz),
            _ => None,
        }
    }

    /// Lenient lookup: unknown or empty names resolve to the central Biz project.
    pub fn parse(name: &str) -> Region {
        Region::from_name(name).unwrap_or(Region::Biz)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Korea => "korea",
            Region::Japan => "japan",
            Region::Us => "us",
            Region::Taiwan => "taiwan",
            Region::Biz => "biz",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Region::Korea => "한국",
            Region::Japan => "일본",
            Region::Us => "미국",
            Region::Taiwan => "대만",
            Region::Biz => "BIZ",
        }
    }

    /// Japan, US and Taiwan campaign tables have no `updated_at` column.
    pub fn tracks_updated_at(&self) -> bool {
        matches!(self, Region::Korea | Region::Biz)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One connection per configured regional database.
#[derive(Clone, Default)]
pub struct RegionalDatabases {
    connections: Arc<HashMap<Region, DatabaseConnection>>,
}

impl RegionalDatabases {
    #[tracing::instrument(skip(config))]
    pub async fn connect(config: &Config) -> Self {
        let mut connections = HashMap::new();

        for region in Region::ALL {
            let Some(url) = config.database_url(region) else {
                tracing::info!("No database configured for {} region", region);
                continue;
            };

            match Database::connect(url).await {
                Ok(conn) => {
                    tracing::info!("Connected to {} database", region);
                    connections.insert(region, conn);
                }
                Err(e) => {
                    tracing::error!(?e, "failed to connect to {} database", region);
                }
            }
        }

        Self {
            connections: Arc::new(connections),
        }
    }

    pub fn from_connections(connections: impl IntoIterator<Item = (Region, DatabaseConnection)>) -> Self {
        Self {
            connections: Arc::new(connections.into_iter().collect()),
        }
    }

    pub fn get(&self, region: Region) -> Result<&DatabaseConnection, AppError> {
        self.connections
            .get(&region)
            .ok_or(AppError::RegionNotConfigured(region))
    }

    pub fn try_get(&self, region: Region) -> Option<&DatabaseConnection> {
        self.connections.get(&region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(Region::parse("kr"), Region::Korea);
        assert_eq!(Region::parse("KOREA"), Region::Korea);
        assert_eq!(Region::parse("jp"), Region::Japan);
        assert_eq!(Region::parse("usa"), Region::Us);
        assert_eq!(Region::parse(" tw "), Region::Taiwan);
    }

    #[test]
    fn parse_falls_back_to_biz() {
        assert_eq!(Region::parse(""), Region::Biz);
        assert_eq!(Region::parse("mars"), Region::Biz);
        assert_eq!(Region::from_name("mars"), None);
        assert_eq!(Region::from_name(" Biz "), Some(Region::Biz));
    }

    #[test]
    fn only_korea_and_biz_track_updated_at() {
        let tracked: Vec<Region> = Region::ALL.into_iter().filter(|r| r.tracks_updated_at()).collect();
        assert_eq!(tracked, vec![Region::Korea, Region::Biz]);
    }

    #[test]
    fn unconfigured_region_is_an_error() {
        let dbs = RegionalDatabases::default();
        assert!(matches!(dbs.get(Region::Japan), Err(AppError::RegionNotConfigured(Region::Japan))));
    }
}
