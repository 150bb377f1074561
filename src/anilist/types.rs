use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AniListToken {
    pub access_token: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaListStatus {
    Current,
    Planning,
    Completed,
    Paused,
    Dropped,
    Repeating,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaSeason {
    Winter,
    Spring,
    Summer,
    Fall,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CoverImage {
    pub large: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: i64,
    pub title: MediaTitle,
    pub episodes: Option<i64>,
    #[serde(default)]
    pub cover_image: CoverImage,
    pub average_score: Option<i64>,
    pub season_year: Option<i64>,
    pub season: Option<MediaSeason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerStatistics {
    pub anime: Option<ViewerAnimeStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerAnimeStats {
    pub count: i64,
    #[serde(rename = "episodesWatched")]
    pub episodes_watched: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewer {
    pub id: i64,
    pub name: String,
    pub statistics: Option<ViewerStatistics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListEntry {
    pub id: i64,
    pub status: MediaListStatus,
    pub progress: i64,
    pub media: Media,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequelRelation {
    pub relation_type: String,
    pub node: Media,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub status: Option<String>,
    pub progress: Option<String>,
    pub media: Option<Media>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}
