//! GraphQL query and mutation bodies for the AniList client (C7).
//!
//! Field selections follow the teacher's
//! `infrastructure::external::anilist::graphql::AniListQueries` constants —
//! trimmed to the fields this crate's [`super::types`] structs actually
//! deserialize.

pub const MEDIA_FRAGMENT: &str = r#"
    id
    title { romaji english native }
    episodes
    coverImage { large medium }
    averageScore
    seasonYear
    season
"#;

pub const VIEWER_QUERY: &str = r#"
query {
    Viewer {
        id
        name
        statistics {
            anime { count episodesWatched }
        }
    }
}
"#;

pub const TRENDING_QUERY: &str = r#"
query ($page: Int, $perPage: Int, $year: Int, $season: MediaSeason) {
    Page(page: $page, perPage: $perPage) {
        media(type: ANIME, seasonYear: $year, season: $season, sort: [TRENDING_DESC, POPULARITY_DESC]) {
            id
            title { romaji english native }
            episodes
            coverImage { large medium }
            averageScore
            seasonYear
            season
        }
    }
}
"#;

pub const USER_LIST_QUERY: &str = r#"
query ($userId: Int, $status: MediaListStatus) {
    MediaListCollection(userId: $userId, type: ANIME, status: $status) {
        lists {
            entries {
                id
                status
                progress
                media {
                    id
                    title { romaji english native }
                    episodes
                    coverImage { large medium }
                    averageScore
                    seasonYear
                    season
                }
                createdAt
            }
        }
    }
}
"#;

pub const SEARCH_QUERY: &str = r#"
query ($search: String, $perPage: Int) {
    Page(page: 1, perPage: $perPage) {
        media(search: $search, type: ANIME, sort: [POPULARITY_DESC, SCORE_DESC]) {
            id
            title { romaji english native }
            episodes
            coverImage { large medium }
            averageScore
            seasonYear
            season
        }
    }
}
"#;

pub const MEDIA_QUERY: &str = r#"
query ($id: Int) {
    Media(id: $id, type: ANIME) {
        id
        title { romaji english native }
        episodes
        coverImage { large medium }
        averageScore
        seasonYear
        season
    }
}
"#;

pub const LIST_ENTRY_QUERY: &str = r#"
query ($mediaId: Int, $userId: Int) {
    MediaList(mediaId: $mediaId, userId: $userId) {
        id
        status
        progress
        media {
            id
            title { romaji english native }
            episodes
            coverImage { large medium }
            averageScore
            seasonYear
            season
        }
    }
}
"#;

pub const SAVE_LIST_ENTRY_MUTATION: &str = r#"
mutation ($mediaId: Int, $progress: Int, $status: MediaListStatus) {
    SaveMediaListEntry(mediaId: $mediaId, progress: $progress, status: $status) {
        id
        status
        progress
    }
}
"#;

pub const SEQUELS_QUERY: &str = r#"
query ($id: Int) {
    Media(id: $id, type: ANIME) {
        relations {
            edges {
                relationType
                node {
                    id
                    title { romaji english native }
                    episodes
                    coverImage { large medium }
                    averageScore
                    seasonYear
                    season
                }
            }
        }
    }
}
"#;

pub const RECENT_ACTIVITIES_QUERY: &str = r#"
query ($userId: Int, $perPage: Int) {
    Page(page: 1, perPage: $perPage) {
        activities(userId: $userId, type: ANIME_LIST, sort: ID_DESC) {
            ... on ListActivity {
                id
                status
                progress
                createdAt
                media {
                    id
                    title { romaji english native }
                    episodes
                    coverImage { large medium }
                    averageScore
                    seasonYear
                    season
                }
            }
        }
    }
}
"#;
