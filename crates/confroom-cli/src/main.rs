//! Terminal front end: checks whether a conference link can be entered and
//! manages recording rules.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

use confroom_core::api::{ConferenceApi, RecordingRule};
use confroom_core::entry::{EntryInput, EntryMachine};
use confroom_core::params::PageParams;
use confroom_core::room::RoomLookup;
use confroom_core::session::RoomDirectory;
use confroom_core::settings::{PreferencesStore, ShellConfig};
use confroom_core::window::format_local;
use confroom_core::{EligibilityVerdict, Screen};

#[derive(Parser)]
#[command(name = "confroom", about = "Conference room entry checks")]
struct Cli {
    /// JSON config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the room behind a conference link and report whether it can be entered.
    Check {
        /// Full conference page URL, including `token` and optionally `name`.
        page_url: String,
        /// Directory for remembered preferences.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Include or exclude every track from a live room's recording.
    RecordingRules {
        page_url: String,
        #[arg(long)]
        room_sid: String,
        #[arg(long)]
        client_id: String,
        #[arg(long, value_enum)]
        mode: RulesMode,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RulesMode {
    Include,
    Exclude,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("confroom_core=info,confroom_cli=info")
                }),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ShellConfig::load_from(path)?,
        None => ShellConfig::default(),
    };

    match cli.command {
        Command::Check { page_url, data_dir } => check(&page_url, config, data_dir).await,
        Command::RecordingRules {
            page_url,
            room_sid,
            client_id,
            mode,
        } => {
            let page = Url::parse(&page_url).context("invalid page url")?;
            let api = ConferenceApi::for_page(&page, config)?;
            let rules = match mode {
                RulesMode::Include => [RecordingRule::include_all()],
                RulesMode::Exclude => [RecordingRule::exclude_all()],
            };
            let answer = api
                .update_recording_rules(&room_sid, &rules, &client_id)
                .await?;
            println!("{answer}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Exit code 2 means the room cannot be entered.
async fn check(page_url: &str, config: ShellConfig, data_dir: Option<PathBuf>) -> Result<ExitCode> {
    let page = Url::parse(page_url).context("invalid page url")?;
    let params = PageParams::from_url(&page);
    let Some(token) = params.token.clone() else {
        bail!("page url has no `token` parameter");
    };

    let window = config.access_window();
    let api = ConferenceApi::for_page(&page, config)?;
    tracing::info!("using conference api at {}", api.base());
    let lookup = RoomLookup::from_fetch(api.fetch_room_record(&token).await);

    let now = Utc::now();
    let mut machine = EntryMachine::new(params.clone(), window);
    machine.handle(EntryInput::RecordArrived(lookup), now);

    if let Some(record) = machine.record() {
        println!("room:     {} ({})", record.title, record.client_name);
        println!("owner:    {}", record.owner_name);
        println!(
            "window:   {} .. {}",
            format_local(record.accessible_from),
            format_local(record.accessible_to)
        );
        if let Some(next) = window.next_transition(record, now) {
            println!("changes:  {}", format_local(next));
        }
    }

    let verdict = machine.verdict(now);
    println!("verdict:  {verdict:?}");

    let preferences = data_dir.map(|dir| PreferencesStore::new(&dir));
    if verdict == EligibilityVerdict::Open {
        match (&params.name, &preferences) {
            (Some(name), Some(store)) => {
                store.set_display_name(Some(name.clone()));
                println!("entry:    auto-join as {name}");
            }
            (Some(name), None) => println!("entry:    auto-join as {name}"),
            (None, Some(store)) => match store.get().display_name {
                Some(last) => println!("entry:    manual (last used name: {last})"),
                None => println!("entry:    manual"),
            },
            (None, None) => println!("entry:    manual"),
        }
    }

    let screen = Screen::decide(
        machine.phase(),
        machine.record(),
        &confroom_core::events::ConnectionState::Disconnected,
        false,
        &chrono::Local,
    );
    if let Screen::Error { title, message } = screen {
        println!("{title}: {message}");
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
