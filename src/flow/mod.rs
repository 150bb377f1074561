//! Interactive flow controller (C11).
//!
//! Grounded on the anitrack-cli reference's `Select`/`Input`-driven menu
//! loop (`examples/other_examples/.../src-main.rs.rs`) for the
//! `dialoguer` idiom, and on `services/history_service.py::load_history`
//! for the resume-aware episode menu (`previous/current/next/other/restart`)
//! and the multi-source disambiguation prompt. Drives the core (C4, C6,
//! C9, C10) but owns no state of its own beyond the current menu position.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{FuzzySelect, Input, Select};

use crate::anilist::AniListClient;
use crate::catalog::Catalog;
use crate::history::HistoryStore;
use crate::identity::{IdentityMappingStore, IdentityResolver};
use crate::player::{ExternalPlayerDriver, PlaybackStatus};
use crate::playback::{PlaybackOrchestrator, SyncOutcome};

/// Bundles every long-lived collaborator the flow controller drives.
/// Constructed once at startup and handed around by reference.
pub struct AppContext {
    pub catalog: Arc<Catalog>,
    pub identity: Arc<IdentityResolver>,
    pub mappings: Arc<IdentityMappingStore>,
    pub anilist: Arc<AniListClient>,
    pub history: Arc<HistoryStore>,
    pub playback: PlaybackOrchestrator,
    pub player: ExternalPlayerDriver,
    /// Set by `--debug`: skips the subprocess player launch and echoes
    /// diagnostic info instead (§6).
    pub debug: bool,
}

pub struct FlowController {
    ctx: AppContext,
}

impl FlowController {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    fn theme() -> ColorfulTheme {
        ColorfulTheme::default()
    }

    /// Main menu: `{search, continue-watching, anilist, manga}` (§6). The
    /// manga subsystem is an out-of-scope external collaborator (§1); its
    /// menu entry is present for surface-compatibility but immediately
    /// reports as unavailable.
    pub async fn run_main_menu(&self) {
        let options = ["Search", "Continue watching", "AniList", "Manga", "Quit"];
        loop {
            let choice = Select::with_theme(&Self::theme())
                .with_prompt("anicore")
                .items(&options)
                .default(0)
                .interact_opt();

            match choice {
                Ok(Some(0)) => self.run_search_flow(None).await,
                Ok(Some(1)) => self.run_continue_watching_flow().await,
                Ok(Some(2)) => self.run_anilist_menu().await,
                Ok(Some(3)) => println!("The manga subsystem is not part of this core."),
                Ok(Some(_)) | Ok(None) => return,
                Err(e) => {
                    log::warn!("menu input error: {e}");
                    return;
                }
            }
        }
    }

    /// Entry point for `-q/--query`: skips the main menu and opens
    /// directly into a search (§6).
    pub async fn run_search_flow(&self, initial_query: Option<String>) {
        let query = match initial_query {
            Some(q) => q,
            None => match Input::<String>::with_theme(&Self::theme())
                .with_prompt("Search")
                .interact_text()
            {
                Ok(q) => q,
                Err(e) => {
                    log::warn!("query input error: {e}");
                    return;
                }
            },
        };

        self.ctx.catalog.search(&query, self.ctx.debug).await;

        let Some(anime_title) = self.pick_anime(&query).await else {
            return;
        };

        self.run_episode_flow(&anime_title, None).await;
    }

    /// Lets the user pick among ranked catalog entries, or reports that
    /// nothing was found. Returns the chosen title, or `None` on cancel.
    async fn pick_anime(&self, original_query: &str) -> Option<String> {
        let ranked = self
            .ctx
            .catalog
            .titles_with_sources(None, Some(original_query))
            .await;
        if ranked.is_empty() {
            println!("No results for '{original_query}'.");
            return None;
        }

        let idx = FuzzySelect::with_theme(&Self::theme())
            .with_prompt(format!("Results for '{original_query}'"))
            .items(&ranked)
            .default(0)
            .interact_opt()
            .ok()
            .flatten()?;

        // "Title [src1, src2]" -> "Title"
        let decorated = &ranked[idx];
        let title = decorated.rsplit_once(" [").map(|(t, _)| t).unwrap_or(decorated);
        Some(title.to_string())
    }

    /// Per-anime identity-mapping reuse prompt, then episode selection and
    /// playback for a single episode or a continue-from-here loop.
    ///
    /// Returns a boxed, type-erased future: this call chain closes a cycle
    /// through `play_episode` -> `confirm_and_sync` -> `offer_sequel` ->
    /// back into this function for the chosen sequel, which an `async fn`
    /// cannot express directly (its state machine type would be infinite).
    fn run_episode_flow<'a>(
        &'a self,
        anime_title: &'a str,
        resume_episode_idx: Option<usize>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
        self.maybe_resolve_identity(anime_title).await;

        self.ctx.catalog.search_episodes(anime_title, None).await;
        let Some(episode_list) = self.ctx.catalog.episode_list(anime_title).await else {
            println!("'{anime_title}' was not found in any active source.");
            return;
        };
        if episode_list.is_empty() {
            println!("No episodes listed for '{anime_title}'.");
            return;
        }

        let mut episode_idx = resume_episode_idx.unwrap_or(0);

        loop {
            let mut options = Vec::new();
            let mut option_targets = Vec::new();

            if episode_idx > 0 {
                options.push(format!("Previous ({})", episode_idx));
                option_targets.push(Some(episode_idx - 1));
            }
            options.push(format!("Play episode {}", episode_idx + 1));
            option_targets.push(Some(episode_idx));
            if episode_idx + 1 < episode_list.len() {
                options.push(format!("Next ({})", episode_idx + 2));
                option_targets.push(Some(episode_idx + 1));
            }
            options.push("Choose another episode".to_string());
            option_targets.push(None);
            options.push("Back".to_string());
            option_targets.push(None);

            let back_idx = options.len() - 1;
            let choose_idx = options.len() - 2;

            let Some(selected) = Select::with_theme(&Self::theme())
                .with_prompt(format!("{anime_title}"))
                .items(&options)
                .default(0)
                .interact_opt()
                .ok()
                .flatten()
            else {
                return;
            };

            if selected == back_idx {
                return;
            }

            let target = if selected == choose_idx {
                let Some(chosen) = Select::with_theme(&Self::theme())
                    .with_prompt("Episode")
                    .items(&episode_list.titles)
                    .default(episode_idx)
                    .interact_opt()
                    .ok()
                    .flatten()
                else {
                    continue;
                };
                chosen
            } else {
                match option_targets[selected] {
                    Some(idx) => idx,
                    None => continue,
                }
            };

            episode_idx = target;
            let continued = self.play_episode(anime_title, episode_idx, &episode_list).await;
            if !continued {
                return;
            }
            episode_idx = (episode_idx + 1).min(episode_list.len().saturating_sub(1));
        }
        })
    }

    /// If this anime has no known anilist_id yet, tries auto-discovery and
    /// offers a previously-confirmed mapping as a default (§4.6).
    async fn maybe_resolve_identity(&self, anime_title: &str) {
        if self.ctx.catalog.anilist_id_for(anime_title).await.is_some() {
            return;
        }
        if let Some(id) = self.ctx.identity.resolve(anime_title).await {
            self.ctx.catalog.record_anilist_id(anime_title, id).await;
            if let Some(existing) = self.ctx.mappings.get(id).await {
                println!(
                    "Previously matched to AniList #{id} via '{}'. Continue with this?",
                    existing.scraper_title
                );
            }
            let _ = self
                .ctx
                .mappings
                .record(id, anime_title.to_string(), anime_title.to_string())
                .await;
        }
    }

    /// Resolves and plays a single episode, then runs post-play sync.
    /// Returns whether the caller should offer to continue to the next
    /// episode.
    async fn play_episode(
        &self,
        anime_title: &str,
        episode_idx: usize,
        episode_list: &crate::catalog::types::EpisodeList,
    ) -> bool {
        let Some((_url, _source)) = self
            .ctx
            .catalog
            .episode_url_and_source(anime_title, episode_idx + 1)
            .await
        else {
            println!("Episode {} is not available in any active source.", episode_idx + 1);
            return false;
        };

        let candidates = self.ctx.catalog.candidates_for(anime_title).await;
        let source_candidates: Vec<(String, String)> = candidates
            .iter()
            .filter_map(|c| {
                episode_list
                    .urls
                    .get(episode_idx)
                    .filter(|_| c.source == episode_list.source)
                    .map(|url| (url.clone(), c.source.clone()))
            })
            .collect();
        let source_candidates = if source_candidates.is_empty() {
            vec![(episode_list.urls[episode_idx].clone(), episode_list.source.clone())]
        } else {
            source_candidates
        };

        let Some(stream) = self.ctx.playback.resolve_stream(&source_candidates).await else {
            println!("Could not resolve a stream for episode {}.", episode_idx + 1);
            return false;
        };

        if self.ctx.debug {
            println!("[debug] resolved stream: {} (skipping player launch)", stream.url);
            return false;
        }

        let status = self.ctx.player.play(&stream);
        match status {
            PlaybackStatus::Aborted => {
                println!("Playback aborted before completion; progress not recorded.");
                false
            }
            PlaybackStatus::Error => {
                println!("Player reported an error.");
                false
            }
            PlaybackStatus::Ok => self.confirm_and_sync(anime_title, episode_idx, episode_list).await,
        }
    }

    async fn confirm_and_sync(
        &self,
        anime_title: &str,
        episode_idx: usize,
        episode_list: &crate::catalog::types::EpisodeList,
    ) -> bool {
        let confirmed = Select::with_theme(&Self::theme())
            .with_prompt("Did you finish watching this episode?")
            .items(&["Yes", "No"])
            .default(0)
            .interact_opt()
            .ok()
            .flatten()
            == Some(0);

        if !confirmed {
            return false;
        }

        let anilist_id = self.ctx.catalog.anilist_id_for(anime_title).await;
        let outcome = self
            .ctx
            .playback
            .sync_progress(
                anime_title,
                episode_idx,
                anilist_id,
                Some(episode_list.source.clone()),
                Some(episode_list.len()),
            )
            .await;

        match outcome {
            SyncOutcome::Synced { status_change: Some((from, to)) } => {
                println!("Synced to AniList ({from:?} -> {to:?}).")
            }
            SyncOutcome::Synced { status_change: None } => println!("Synced progress to AniList."),
            SyncOutcome::AuthExpired => println!("AniList session expired; run `anilist auth` again."),
            SyncOutcome::SyncFailed => println!("Could not sync progress to AniList right now."),
            SyncOutcome::LocalOnly => {}
        }

        if episode_idx + 1 >= episode_list.len() {
            self.offer_sequel(anilist_id).await;
            return false;
        }

        true
    }

    async fn offer_sequel(&self, anilist_id: Option<i64>) {
        let sequels = self.ctx.playback.offer_sequels(anilist_id).await;
        if sequels.is_empty() {
            return;
        }

        let labels: Vec<String> = sequels
            .iter()
            .map(|m| m.title.romaji.clone().or_else(|| m.title.english.clone()).unwrap_or_default())
            .collect();

        let prompt = if sequels.len() == 1 {
            format!("Continue with '{}'?", labels[0])
        } else {
            "Multiple sequels found — pick one to continue".to_string()
        };

        let chosen = if sequels.len() == 1 {
            Select::with_theme(&Self::theme())
                .with_prompt(prompt)
                .items(&["Yes", "No"])
                .default(0)
                .interact_opt()
                .ok()
                .flatten()
                .filter(|&i| i == 0)
                .map(|_| 0)
        } else {
            Select::with_theme(&Self::theme())
                .with_prompt(prompt)
                .items(&labels)
                .default(0)
                .interact_opt()
                .ok()
                .flatten()
        };

        if let Some(idx) = chosen {
            let title = labels[idx].clone();
            self.ctx.catalog.search(&title, self.ctx.debug).await;
            if let Some(picked) = self.pick_anime(&title).await {
                self.run_episode_flow(&picked, Some(0)).await;
            }
        }
    }

    /// Entry point for `-c/--continue_watching`: opens directly into the
    /// history-backed selector (§6).
    pub async fn run_continue_watching_flow(&self) {
        let entries = self.ctx.history.list_sorted_by_timestamp_desc().await;
        if entries.is_empty() {
            println!("No watch history yet.");
            return;
        }

        let labels: Vec<String> = entries
            .iter()
            .map(|(title, record)| {
                let progress = match record.total_episodes {
                    Some(total) => format!("{}/{total}", record.episode_idx + 1),
                    None => format!("Ep {}", record.episode_idx + 1),
                };
                format!("{title} ({progress}) — {}", format_last_watched(record.timestamp))
            })
            .collect();

        let Some(idx) = Select::with_theme(&Self::theme())
            .with_prompt("Continue watching")
            .items(&labels)
            .default(0)
            .interact_opt()
            .ok()
            .flatten()
        else {
            return;
        };

        let (anime, record) = &entries[idx];

        // AniList progress is the source of truth when it's strictly ahead.
        let anilist_episode_idx = match record.anilist_id {
            Some(id) => self
                .ctx
                .anilist
                .list_entry(id)
                .await
                .map(|e| (e.progress - 1).max(0) as usize),
            None => None,
        };
        let resume_idx = match anilist_episode_idx {
            Some(remote) if remote > record.episode_idx => remote,
            _ => record.episode_idx,
        };

        self.ctx.catalog.search(anime, self.ctx.debug).await;
        let anime_title = match self.ctx.catalog.titles(Some(anime.as_str())).await.into_iter().next() {
            Some(t) => t,
            None => anime.clone(),
        };

        self.run_episode_flow(&anime_title, Some(resume_idx)).await;
    }

    /// AniList sub-menu (`anilist menu`, §6): viewer info and list
    /// browsing. `anilist auth` is handled by `main` before the flow
    /// controller is entered, since it replaces the token on disk.
    pub async fn run_anilist_menu(&self) {
        let options = ["Viewer info", "Current list", "Planning list", "Back"];
        loop {
            let choice = Select::with_theme(&Self::theme())
                .with_prompt("AniList")
                .items(&options)
                .default(0)
                .interact_opt();

            match choice {
                Ok(Some(0)) => match self.ctx.anilist.viewer().await {
                    Some(viewer) => println!("Logged in as {} (#{})", viewer.name, viewer.id),
                    None => println!("Not authenticated. Run `anicore anilist auth`."),
                },
                Ok(Some(1)) => self.print_list(crate::anilist::MediaListStatus::Current).await,
                Ok(Some(2)) => self.print_list(crate::anilist::MediaListStatus::Planning).await,
                Ok(Some(_)) | Ok(None) => return,
                Err(e) => {
                    log::warn!("menu input error: {e}");
                    return;
                }
            }
        }
    }

    async fn print_list(&self, status: crate::anilist::MediaListStatus) {
        let entries = self.ctx.anilist.user_list(status).await;
        if entries.is_empty() {
            println!("Nothing here.");
            return;
        }
        for entry in entries {
            let title = entry.media.title.romaji.unwrap_or_default();
            println!("{title} — progress {}", entry.progress);
        }
    }
}

/// Renders a history record's epoch-seconds timestamp for the
/// continue-watching menu. The stored record itself stays a bare `u64`
/// (§3 `HistoryRecord`) — this is display-only formatting.
fn format_last_watched(timestamp_secs: u64) -> String {
    match DateTime::<Utc>::from_timestamp(timestamp_secs as i64, 0) {
        Some(dt) => format!("last watched {}", dt.format("%Y-%m-%d %H:%M UTC")),
        None => "last watched unknown".to_string(),
    }
}
