//! Binary entry point (§6): parses the CLI, boots the logger and every
//! component, then dispatches into the flow controller.

use clap::Parser;

use anicore::cli::{AnilistAction, Cli, Command};
use anicore::config::{Settings, StatePaths};
use anicore::flow::FlowController;

/// AniList's public implicit-grant client id (same one `viu`/`ani-tupi`
/// use) — no client secret is needed for this flow.
const DEFAULT_ANILIST_CLIENT_ID: &str = "20148";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    anicore::logging::init(cli.debug);

    let paths = match StatePaths::resolve() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("could not resolve a state directory: {e}");
            std::process::exit(1);
        }
    };

    let settings = match Settings::load(&paths.root) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("could not load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Some(Command::Anilist { action }) = &cli.command {
        match action.clone().unwrap_or(AnilistAction::Menu) {
            AnilistAction::Auth => {
                let client = anicore::anilist::AniListClient::new(paths.anilist_token_file());
                run_auth_flow(&client, &settings).await;
                return;
            }
            AnilistAction::Menu => {
                // falls through to bootstrap below, which opens the AniList menu directly.
            }
        }
    }

    let ctx = match anicore::bootstrap(settings, paths, cli.debug).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("failed to start up: {e}");
            std::process::exit(1);
        }
    };

    let controller = FlowController::new(ctx);

    if matches!(&cli.command, Some(Command::Anilist { .. })) {
        controller.run_anilist_menu().await;
        return;
    }

    if cli.continue_watching {
        controller.run_continue_watching_flow().await;
        return;
    }

    if cli.query.is_some() {
        controller.run_search_flow(cli.query).await;
        return;
    }

    controller.run_main_menu().await;
}

/// Manual implicit-grant OAuth flow (§4.6, §9): prints the authorize URL
/// instead of spawning a browser, and accepts the token pasted back either
/// raw or as the full redirect URL/fragment.
async fn run_auth_flow(client: &anicore::anilist::AniListClient, settings: &Settings) {
    let client_id = if settings.anilist.client_id.is_empty() {
        DEFAULT_ANILIST_CLIENT_ID
    } else {
        &settings.anilist.client_id
    };
    let auth_url =
        format!("https://anilist.co/api/v2/oauth/authorize?client_id={client_id}&response_type=token");

    println!("Open this URL, approve access, then paste the resulting token or redirect URL below:");
    println!("{auth_url}\n");

    let pasted: String = match dialoguer::Input::with_theme(&dialoguer::theme::ColorfulTheme::default())
        .with_prompt("Token")
        .interact_text()
    {
        Ok(value) => value,
        Err(e) => {
            eprintln!("could not read input: {e}");
            std::process::exit(1);
        }
    };

    let token = parse_pasted_token(&pasted);
    if token.is_empty() {
        eprintln!("no token found in input");
        std::process::exit(1);
    }

    if !client.set_token(token).await {
        eprintln!("could not persist token to disk");
        std::process::exit(1);
    }

    match client.viewer().await {
        Some(viewer) => println!("Authenticated as {}", viewer.name),
        None => {
            eprintln!("token was saved but did not validate against the AniList API");
            std::process::exit(1);
        }
    }
}

/// Extracts an access token from a raw token, a full redirect URL
/// (`...#access_token=...`), or a URL-encoded fragment. Browsers that
/// copy the address bar often percent-encode the `#`, so the input is
/// decoded before the markers are matched.
fn parse_pasted_token(input: &str) -> String {
    let decoded = urlencoding::decode(input.trim())
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| input.trim().to_string());
    for marker in ["#access_token=", "access_token="] {
        if let Some(rest) = decoded.split(marker).nth(1) {
            return rest.split('&').next().unwrap_or(rest).to_string();
        }
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_token() {
        assert_eq!(parse_pasted_token("abc123"), "abc123");
    }

    #[test]
    fn parses_full_redirect_url() {
        assert_eq!(
            parse_pasted_token("https://anilist.co/api/v2/oauth/pin#access_token=abc123&token_type=Bearer"),
            "abc123"
        );
    }

    #[test]
    fn parses_bare_fragment() {
        assert_eq!(parse_pasted_token("access_token=abc123&token_type=Bearer"), "abc123");
    }
}
