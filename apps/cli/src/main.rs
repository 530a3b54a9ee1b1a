use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    AppContext, CoordinatorConfig, CoordinatorState, EntityKind, HttpListBackend, InventoryClient,
    ListCoordinator, ListItem, ListQuery, LogNotifier, Mode, ACTAS, EQUIPMENT, HISTORY, USERS,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::domain::{Acta, Equipment, HistoryEntry, User};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod settings;

use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "inventory", about = "Browse and search the inventory API")]
struct Args {
    /// Settings file; defaults to ./inventory.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, env = "INVENTORY_TOKEN")]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one page of an entity list.
    List {
        #[arg(value_enum)]
        entity: Entity,
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Free-text search, narrowed by any filters.
    Search {
        #[arg(value_enum)]
        entity: Entity,
        term: String,
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    DarkMode {
        #[arg(value_enum, default_value_t = Toggle::Toggle)]
        state: Toggle,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Entity {
    Equipment,
    Users,
    History,
    Actas,
}

impl Entity {
    fn kind(self) -> &'static EntityKind {
        match self {
            Self::Equipment => &EQUIPMENT,
            Self::Users => &USERS,
            Self::History => &HISTORY,
            Self::Actas => &ACTAS,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Toggle {
    On,
    Off,
    Toggle,
}

struct ListArgs {
    filters: Vec<(String, String)>,
    page: usize,
    page_size: Option<usize>,
    term: Option<String>,
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing filter key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn resolve_page_size(requested: Option<usize>, settings: &Settings) -> Result<usize> {
    match requested {
        Some(0) => bail!("--page-size must be greater than zero"),
        Some(size) => Ok(size),
        None => Ok(settings.page_size),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let settings = settings::load_settings(args.config.as_deref())?;

    let mut client =
        InventoryClient::with_timeout(&settings.api_base_url, settings.request_timeout())
            .with_context(|| format!("invalid api_base_url '{}'", settings.api_base_url))?;
    client.set_token(args.token.clone());
    info!(api = %client.base_url(), "inventory client ready");

    match args.command {
        Command::List {
            entity,
            filters,
            page,
            page_size,
        } => {
            let list = ListArgs {
                filters,
                page,
                page_size,
                term: None,
            };
            run_entity(entity, client, &settings, list).await
        }
        Command::Search {
            entity,
            term,
            filters,
            page,
            page_size,
        } => {
            if term.trim().is_empty() {
                bail!("search term must not be empty");
            }
            let list = ListArgs {
                filters,
                page,
                page_size,
                term: Some(term),
            };
            run_entity(entity, client, &settings, list).await
        }
        Command::Login { email, password } => {
            let session = client.login(&email, &password).await?;
            let mut context = AppContext::in_memory();
            context.sign_in(session);
            if let Some(user) = context.user() {
                info!(user = %user.name, role = ?user.role, "signed in");
            }
            println!("{}", context.token().unwrap_or_default());
            Ok(())
        }
        Command::DarkMode { state } => {
            let mut context = match settings
                .preferences_path
                .clone()
                .or_else(AppContext::default_preferences_path)
            {
                Some(path) => AppContext::load(path),
                None => AppContext::in_memory(),
            };
            let enabled = match state {
                Toggle::On => context.set_dark_mode(true).map(|_| true)?,
                Toggle::Off => context.set_dark_mode(false).map(|_| false)?,
                Toggle::Toggle => context.toggle_dark_mode()?,
            };
            println!("dark mode {}", if enabled { "on" } else { "off" });
            Ok(())
        }
    }
}

async fn run_entity(
    entity: Entity,
    client: InventoryClient,
    settings: &Settings,
    args: ListArgs,
) -> Result<()> {
    match entity {
        Entity::Equipment => run_list::<Equipment>(client, entity.kind(), settings, args).await,
        Entity::Users => run_list::<User>(client, entity.kind(), settings, args).await,
        Entity::History => run_list::<HistoryEntry>(client, entity.kind(), settings, args).await,
        Entity::Actas => run_list::<Acta>(client, entity.kind(), settings, args).await,
    }
}

async fn run_list<T>(
    client: InventoryClient,
    kind: &'static EntityKind,
    settings: &Settings,
    args: ListArgs,
) -> Result<()>
where
    T: ListItem + DeserializeOwned + Serialize,
{
    let page_size = resolve_page_size(args.page_size, settings)?;
    let mut query = ListQuery::new(page_size);
    for (key, value) in &args.filters {
        if !kind.filter_keys.iter().any(|k| *k == key.as_str()) {
            bail!(
                "unknown filter '{key}' for {}; expected one of {}",
                kind.name,
                kind.filter_keys.join(", ")
            );
        }
        query = query.filter(key.as_str(), value.as_str());
    }
    let page = args.page.saturating_sub(1);

    let coordinator = ListCoordinator::new(
        HttpListBackend::<T>::new(client, kind),
        Arc::new(LogNotifier),
        CoordinatorConfig {
            search_debounce: settings.search_debounce(),
        },
        query,
    );
    let mut rx = coordinator.subscribe();

    match args.term {
        None => {
            if page > 0 {
                coordinator.set_page(page);
            } else {
                coordinator.refresh();
            }
            settle(&mut rx, |s| !s.loading).await?;
        }
        Some(term) => {
            // Mount first; actas match against the loaded page.
            coordinator.refresh();
            settle(&mut rx, |s| !s.loading).await?;
            coordinator.set_search_term(term);
            settle(&mut rx, |s| s.mode == Mode::Search && !s.loading).await?;
            if page > 0 {
                coordinator.set_page(page);
            }
        }
    }

    let state = coordinator.state();
    for item in &state.items {
        println!("{}", serde_json::to_string(item)?);
    }
    println!(
        "page {} of {} ({} total)",
        state.query.page + 1,
        state.page_count().max(1),
        state.total
    );
    Ok(())
}

async fn settle<T>(
    rx: &mut watch::Receiver<CoordinatorState<T>>,
    mut done: impl FnMut(&CoordinatorState<T>) -> bool,
) -> Result<()> {
    let state = rx
        .wait_for(|s| (s.last_error.is_some() && !s.loading) || done(s))
        .await
        .context("list coordinator stopped")?;
    if let Some(err) = &state.last_error {
        bail!("{err}");
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
