//! `flashmap` — command-line client for the Flashmap API.
//!
//! # Usage
//!
//! ```
//! flashmap --url http://localhost:8080 --fid 42 map
//! flashmap --config ~/.config/flashmap/config.toml hunt add TK_132 --lat 35.66 --lng 139.70
//! ```
//!
//! Status-list commands keep working while the server is unreachable: writes
//! are applied to a local SQLite cache and replayed on the next successful
//! call (or with `flashmap sync`).

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flashmap_cli::{
  ApiClient, ApiConfig, Fallback, FlashLinkIndex, MapData, StatusApi, StatusOp,
  fallback::LOCAL_PREFIX,
};
use flashmap_core::{
  collection::UserStatusCollection,
  kv::KeyValueStore as _,
  registry::RegistryKind,
  target::{HuntStatus, Target, TargetRef, TargetStatus},
};
use flashmap_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "flashmap", about = "Command-line client for the Flashmap API")]
struct Cli {
  /// Path to a TOML config file (url, fid, cache_path, photo_base_url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the flashmap server (default: http://localhost:8080).
  #[arg(long, env = "FLASHMAP_URL")]
  url: Option<String>,

  /// Your player id.
  #[arg(long, env = "FLASHMAP_FID")]
  fid: Option<u64>,

  /// Local cache database (default: ~/.cache/flashmap/cache.db).
  #[arg(long, env = "FLASHMAP_CACHE")]
  cache: Option<PathBuf>,

  /// HTTP timeout in seconds.
  #[arg(long, default_value_t = 30)]
  timeout: u64,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show every target on your map with its status.
  Map {
    /// Only show these categories.
    #[arg(long, value_enum)]
    only: Vec<Category>,
  },
  /// Manage the hunt list.
  #[command(subcommand)]
  Hunt(HuntCommand),
  /// Save a target as found and alive.
  Alive(TargetArgs),
  /// Save a target as found but destroyed.
  Dead(TargetArgs),
  /// Remove a target from the saved list.
  Unsave { id: String },
  /// Manage the wishlist.
  #[command(subcommand)]
  Wishlist(WishlistCommand),
  /// List flash links, or those of one target.
  Links {
    #[arg(long)]
    invader: Option<String>,
  },
  /// Link a flash to the target it shows.
  Link {
    flash_id: u64,
    #[command(flatten)]
    target:   TargetArgs,
    /// City of the flash.
    #[arg(long)]
    city:     String,
  },
  /// Remove the link of a flash.
  Unlink { flash_id: u64 },
  /// List your flashes with their links.
  Linkable {
    #[arg(long)]
    city: Option<String>,
  },
  /// Replay writes made while the server was unreachable.
  Sync,
  /// Inspect or clear the local cache.
  #[command(subcommand)]
  Cache(CacheCommand),
  /// Show or change your experimental-features flag.
  Experimental {
    #[arg(value_enum)]
    state: Option<Toggle>,
  },
}

#[derive(Subcommand, Debug)]
enum HuntCommand {
  Add(TargetArgs),
  Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum WishlistCommand {
  List,
  Add(TargetArgs),
  Found { id: String },
  Remove { id: String },
  Stats,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  List,
  Clear {
    /// Also drop writes that were never replayed.
    #[arg(long)]
    force: bool,
  },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Category {
  Hunt,
  Alive,
  Dead,
}

impl From<Category> for TargetStatus {
  fn from(c: Category) -> Self {
    match c {
      Category::Hunt => TargetStatus::WantToFind,
      Category::Alive => TargetStatus::Alive,
      Category::Dead => TargetStatus::Dead,
    }
  }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
  On,
  Off,
}

#[derive(Args, Debug, Clone)]
struct TargetArgs {
  /// Target id, e.g. TK_132.
  id:        String,
  #[arg(long, allow_hyphen_values = true)]
  lat:       f64,
  #[arg(long, allow_hyphen_values = true)]
  lng:       f64,
  #[arg(long)]
  name:      Option<String>,
  #[arg(long)]
  image_url: Option<String>,
}

impl From<TargetArgs> for TargetRef {
  fn from(a: TargetArgs) -> Self {
    TargetRef { id: a.id, name: a.name, lat: a.lat, lng: a.lng, image_url: a.image_url }
  }
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:            String,
  #[serde(default)]
  fid:            Option<u64>,
  #[serde(default)]
  cache_path:     Option<PathBuf>,
  #[serde(default)]
  photo_base_url: Option<String>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  if let Err(e) = run(Cli::parse()).await {
    eprintln!("ERROR: {e:#}");
    std::process::exit(1);
  }
}

async fn run(cli: Cli) -> Result<()> {
  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &cli.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let mut api_config = ApiConfig::new(
    cli
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
  );
  api_config.timeout = std::time::Duration::from_secs(cli.timeout);
  let client = ApiClient::new(api_config)?;

  let cache_path = cli
    .cache
    .or(file_cfg.cache_path)
    .unwrap_or_else(|| PathBuf::from("~/.cache/flashmap/cache.db"));
  let cache = Arc::new(open_cache(&expand_tilde(&cache_path)).await?);

  let fid = cli.fid.or(file_cfg.fid);
  let player = || fid.context("no player id configured (use --fid or FLASHMAP_FID)");
  let photo_base_url = file_cfg.photo_base_url.unwrap_or_else(|| "/invaders".into());
  let fallback = Fallback::new(client.clone(), Arc::clone(&cache), photo_base_url);

  match cli.command {
    Command::Cache(cmd) => cache_command(&cache, &cmd).await?,
    Command::Map { only } => {
      let mut map = MapData::new(fallback, player()?);
      map.refresh_if_stale().await?;
      print_map(&map, &only);
    }
    Command::Hunt(HuntCommand::Add(target)) => {
      let mut map = loaded_map(fallback, player()?).await?;
      map.add_to_hunt_list(&target.into()).await?;
      print_counts(&map);
    }
    Command::Hunt(HuntCommand::Remove { id }) => {
      let mut map = loaded_map(fallback, player()?).await?;
      map.remove_from_hunt_list(&id).await?;
      print_counts(&map);
    }
    Command::Alive(target) => {
      let mut map = loaded_map(fallback, player()?).await?;
      map.mark_alive(&target.into()).await?;
      print_counts(&map);
    }
    Command::Dead(target) => {
      let mut map = loaded_map(fallback, player()?).await?;
      map.mark_dead(&target.into()).await?;
      print_counts(&map);
    }
    Command::Unsave { id } => {
      let mut map = loaded_map(fallback, player()?).await?;
      map.remove_from_saved(&id).await?;
      print_counts(&map);
    }
    Command::Wishlist(cmd) => wishlist_command(&fallback, player()?, cmd).await?,
    Command::Links { invader } => {
      let mut index = FlashLinkIndex::new(client, player()?);
      index.load().await?;
      match invader {
        Some(id) => {
          println!("{id}: {} flash(es)", index.count_for_target(&id));
          for link in index.links().into_iter().filter(|l| l.target_id == id) {
            println!("  #{} {} ({})", link.flash_id, link.city, link.linked_date.format("%F"));
          }
        }
        None => {
          for link in index.links() {
            println!("#{} → {} [{}]", link.flash_id, link.target_id, link.city);
          }
        }
      }
    }
    Command::Link { flash_id, target, city } => {
      let mut index = FlashLinkIndex::new(client, player()?);
      let target: TargetRef = target.into();
      index.link(flash_id, &target, &city).await?;
      println!(
        "#{flash_id} → {} ({} flash(es))",
        target.id,
        index.count_for_target(&target.id)
      );
    }
    Command::Unlink { flash_id } => {
      let mut index = FlashLinkIndex::new(client, player()?);
      index.unlink(flash_id).await?;
      println!("#{flash_id} unlinked");
    }
    Command::Linkable { city } => {
      let mut index = FlashLinkIndex::new(client, player()?);
      for item in index.linkable(city.as_deref()).await? {
        let link = item.link.map(|l| l.target_id).unwrap_or_else(|| "-".into());
        println!(
          "#{} {} {} → {link}",
          item.flash.flash_id,
          item.flash.city,
          item.flash.taken_at.format("%F")
        );
      }
    }
    Command::Sync => {
      let fid = player()?;
      for kind in [RegistryKind::Hunt, RegistryKind::Saved, RegistryKind::Wishlist] {
        let replay = fallback.sync(kind, fid).await?;
        println!(
          "{kind}: {} replayed, {} rejected, {} pending",
          replay.replayed, replay.dropped, replay.remaining
        );
      }
    }
    Command::Experimental { state } => {
      let fid = player()?;
      let enabled = match state {
        Some(toggle) => {
          let enabled = matches!(toggle, Toggle::On);
          client.set_experimental(fid, enabled).await?;
          enabled
        }
        None => client.experimental(fid).await?,
      };
      println!("experimental features: {}", if enabled { "on" } else { "off" });
    }
  }
  Ok(())
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn loaded_map<A: StatusApi>(api: A, fid: u64) -> Result<MapData<A>> {
  let mut map = MapData::new(api, fid);
  map.refresh_if_stale().await?;
  Ok(map)
}

async fn wishlist_command<A: StatusApi>(api: &A, fid: u64, cmd: WishlistCommand) -> Result<()> {
  let kind = RegistryKind::Wishlist;
  let collection = match cmd {
    WishlistCommand::List => api.collection(kind, fid).await?,
    WishlistCommand::Add(target) => api.apply(kind, fid, StatusOp::add(target.into())).await?,
    WishlistCommand::Found { id } => {
      let op = StatusOp::SetStatus { target_id: id, status: HuntStatus::Found.into() };
      api.apply(kind, fid, op).await?
    }
    WishlistCommand::Remove { id } => {
      api.apply(kind, fid, StatusOp::Remove { target_id: id }).await?
    }
    WishlistCommand::Stats => {
      let summary = api.collection(kind, fid).await?.summary();
      println!(
        "wanted {}  found {}  total {}  completion {}%",
        summary.total_wanted, summary.total_found, summary.total_items, summary.completion_rate
      );
      return Ok(());
    }
  };
  print_wishlist(&collection);
  Ok(())
}

async fn cache_command(cache: &SqliteStore, cmd: &CacheCommand) -> Result<()> {
  let keys = cache.keys_with_prefix(LOCAL_PREFIX).await?;
  match cmd {
    CacheCommand::List => {
      for key in keys {
        println!("{key}");
      }
    }
    CacheCommand::Clear { force } => {
      if !force {
        for key in keys.iter().filter(|k| k.ends_with(":pending")) {
          let pending = pending_len(cache, key).await?;
          if pending > 0 {
            bail!("{key} holds {pending} unsynced write(s); run `flashmap sync` or pass --force");
          }
        }
      }
      for key in &keys {
        cache.delete(key).await?;
      }
      println!("removed {} key(s)", keys.len());
    }
  }
  Ok(())
}

/// Number of writes in the pending journal stored at `key`.
async fn pending_len(cache: &SqliteStore, key: &str) -> Result<usize> {
  let ops: Vec<StatusOp> = match cache.get(key).await? {
    Some(json) => serde_json::from_str(&json).with_context(|| format!("decoding {key}"))?,
    None => Vec::new(),
  };
  Ok(ops.len())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn label(status: TargetStatus) -> &'static str {
  match status {
    TargetStatus::WantToFind => "hunt",
    TargetStatus::Alive => "alive",
    TargetStatus::Dead => "dead",
  }
}

fn print_map<A: StatusApi>(map: &MapData<A>, only: &[Category]) {
  let shown: Vec<TargetStatus> = if only.is_empty() {
    vec![TargetStatus::WantToFind, TargetStatus::Alive, TargetStatus::Dead]
  } else {
    only.iter().copied().map(Into::into).collect()
  };
  for id in map.filter(&shown) {
    if let Some(status) = map.status_of(id) {
      println!("{id:<12} {}", label(status));
    }
  }
  print_counts(map);
}

fn print_counts<A: StatusApi>(map: &MapData<A>) {
  let counts = map.counts();
  println!("hunt {}  alive {}  dead {}", counts.hunt, counts.alive, counts.dead);
}

/// Wishlist entries use the two-state `want_to_find | found` vocabulary.
fn print_wishlist(collection: &UserStatusCollection) {
  for item in &collection.items {
    println!("{}", wishlist_line(item));
  }
  let stats = &collection.stats;
  println!("wanted {}  found {}", stats.total_wanted, stats.total_found);
}

fn wishlist_line(item: &Target) -> String {
  format!(
    "{:<12} {:<12} {}  added {}",
    item.id,
    item.status.as_hunt_status().to_string(),
    item.name,
    item.added_date.format("%F")
  )
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

async fn open_cache(path: &Path) -> Result<SqliteStore> {
  if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
    std::fs::create_dir_all(dir)
      .with_context(|| format!("creating cache directory {}", dir.display()))?;
  }
  SqliteStore::open(path)
    .await
    .with_context(|| format!("failed to open cache at {}", path.display()))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
