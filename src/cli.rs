//! CLI surface (§6), built with the teacher's `clap` derive idiom.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "anicore", about = "Terminal mediator for anime discovery and playback")]
pub struct Cli {
    /// Open directly into a search flow.
    #[arg(short = 'q', long = "query")]
    pub query: Option<String>,

    /// Open directly into the continue-watching selector.
    #[arg(short = 'c', long = "continue_watching")]
    pub continue_watching: bool,

    /// Load a single hard-wired plugin, skip the subprocess player launch,
    /// and echo diagnostic info.
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// AniList-related subcommands.
    Anilist {
        #[command(subcommand)]
        action: Option<AnilistAction>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AnilistAction {
    /// Run the OAuth browser flow and persist the resulting token.
    Auth,
    /// Open the AniList sub-menu (default when no action is given).
    Menu,
}
