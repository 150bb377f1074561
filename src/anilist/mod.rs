//! AniList GraphQL client (C7).

pub mod client;
pub mod queries;
pub mod rate_limiter;
pub mod types;

pub use client::AniListClient;
pub use types::{
    ActivityRecord, AniListToken, CoverImage, Media, MediaListStatus, MediaSeason, MediaTitle,
    SequelRelation, UserListEntry, Viewer,
};
