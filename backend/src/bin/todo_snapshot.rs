#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]
//! Print one user's to-do lists computed from a JSON fixture of shard tables.
//!
//! Settings come from `TODO_*` environment variables. With `TODO_REDIS_URL`
//! set, results are cached in Redis; otherwise an in-memory cache is used.
//!
//! # Examples
//! ```sh
//! cargo run --manifest-path backend/Cargo.toml --bin todo-snapshot -- \
//!     --fixture fixtures/todo.json --user 1
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cap_std::{ambient_authority, fs::Dir};
use clap::Parser;
use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use todo_backend::TodoSettings;
use todo_backend::domain::ports::TodoCache;
use todo_backend::domain::{NeedsQueryBuilder, UserId};
use todo_backend::outbound::memory::{
    InMemoryLearningStore, InMemoryTodoCache, LearningTables, PermissionGrant,
    StaticPermissionEngine,
};
use todo_backend::outbound::redis_cache::RedisTodoCache;
use todo_backend::presenter::{TodoListPresenter, TodoListSnapshot};

/// `todo-snapshot` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "todo-snapshot",
    about = "Render a user's to-do lists from a JSON fixture",
    version
)]
struct CliArgs {
    /// Path to the JSON fixture holding shard tables and permission grants.
    #[arg(long, value_name = "path")]
    fixture: PathBuf,
    /// Global id of the user whose lists are rendered.
    #[arg(long, value_name = "id")]
    user: i64,
}

/// Fixture layout: every [`LearningTables`] table plus permission grants.
#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(flatten)]
    tables: LearningTables,
    #[serde(default)]
    grants: Vec<PermissionGrant>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = CliArgs::try_parse()?;
    let settings = TodoSettings::load_from_iter([OsString::from("todo-snapshot")])
        .map_err(|err| eyre!("load settings: {err}"))?;
    let fixture = read_fixture(&args.fixture)?;
    let user = UserId::new(args.user);

    let snapshot = match settings.redis_url.as_deref() {
        Some(url) => {
            let cache = RedisTodoCache::connect(url)
                .await
                .wrap_err("connect to redis")?;
            render(fixture, Arc::new(cache), &settings, user).await?
        }
        None => {
            let cache = InMemoryTodoCache::new(Arc::new(DefaultClock));
            render(fixture, Arc::new(cache), &settings, user).await?
        }
    };

    let rendered = serde_json::to_string_pretty(&snapshot).wrap_err("encode snapshot")?;
    println!("{rendered}");
    Ok(())
}

async fn render<C: TodoCache>(
    fixture: Fixture,
    cache: Arc<C>,
    settings: &TodoSettings,
    user: UserId,
) -> Result<TodoListSnapshot> {
    let store = Arc::new(InMemoryLearningStore::new(fixture.tables));
    let permissions = Arc::new(StaticPermissionEngine::new(fixture.grants));
    let needs = NeedsQueryBuilder::new(
        Arc::clone(&store),
        Arc::clone(&store),
        permissions,
        cache,
        Arc::new(DefaultClock),
        settings.needs_config(),
    );
    let presenter = TodoListPresenter::new(Arc::new(needs), settings.presenter_config());

    let list = presenter.build(user).await?;
    info!(
        user = %user,
        hidden = list.total_hidden_count(),
        reads = store.read_count(),
        "rendered to-do snapshot"
    );
    Ok(list.snapshot())
}

/// Split a fixture path into the directory to open and the file inside it.
fn fixture_location(path: &Path) -> Result<(&Path, &OsStr)> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("fixture path must name a file: {}", path.display()))?;
    Ok((parent, file_name))
}

fn read_fixture(path: &Path) -> Result<Fixture> {
    let (parent, file_name) = fixture_location(path)?;
    let directory = Dir::open_ambient_dir(parent, ambient_authority())
        .wrap_err_with(|| format!("open fixture directory '{}'", parent.display()))?;
    let raw = directory
        .read_to_string(Path::new(file_name))
        .wrap_err_with(|| format!("read fixture '{}'", path.display()))?;
    serde_json::from_str(&raw).wrap_err_with(|| format!("parse fixture '{}'", path.display()))
}
