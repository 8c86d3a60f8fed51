use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use url::Url;

use readthru::cache::CacheKey;
use readthru::config::{Config, LogConfig};
use readthru::event::{Event, EventHandler};
use readthru::webservice::{CachedWebservice, Episode, HttpMethod, Resource, Update};

#[derive(Parser, Debug)]
#[command(name = "readthru")]
#[command(about = "Fetch HTTP resources through a local read-through cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/readthru/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load a URL, printing the cached copy first and then the network result
  Fetch {
    url: String,

    #[arg(short, long, value_enum, default_value_t = MethodArg::Get)]
    method: MethodArg,

    /// Request body (POST only)
    #[arg(short, long)]
    body: Option<String>,

    /// Print the body as text instead of decoding it as JSON
    #[arg(long)]
    raw: bool,
  },
  /// Load the episode list (default: <base_url>/episodes.json)
  Episodes {
    /// Server to load from, overriding the configured base URL
    base_url: Option<String>,
  },
  /// Print the cache key a URL is stored under
  Key { url: String },
  /// List stored cache entries
  Entries,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MethodArg {
  Get,
  Post,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _guard = init_logging(&config.log)?;

  match args.command {
    Command::Fetch {
      url,
      method,
      body,
      raw,
    } => {
      let url = parse_url(&url)?;
      let method = request_method(method, body)?;
      let service = CachedWebservice::from_config(&config)?;

      if raw {
        let resource = Resource::new(url, method, |bytes| {
          Some(String::from_utf8_lossy(bytes).into_owned())
        });
        run_load(&service, resource, |text| text.clone()).await
      } else {
        let resource = Resource::new(url, method, |bytes| {
          serde_json::from_slice::<serde_json::Value>(bytes).ok()
        });
        run_load(&service, resource, |value| {
          serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        })
        .await
      }
    }
    Command::Episodes { base_url } => {
      let base_url = base_url.unwrap_or_else(|| config.base_url.clone());
      let service = CachedWebservice::from_config(&config)?;
      run_load(&service, Episode::all(&base_url)?, |episodes| {
        episodes
          .iter()
          .map(|e| format!("{:>6}  {}", e.id, e.title))
          .collect::<Vec<_>>()
          .join("\n")
      })
      .await
    }
    Command::Key { url } => {
      println!("{}", CacheKey::for_url(&parse_url(&url)?));
      Ok(())
    }
    Command::Entries => {
      let service = CachedWebservice::from_config(&config)?;
      for entry in service.cache().entries()? {
        let stored_at = entry
          .stored_at
          .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
          .unwrap_or_else(|| "-".to_string());
        println!("{}  {:>10}  {}", stored_at, entry.size, entry.key);
      }
      Ok(())
    }
  }
}

/// Load through the cache and print updates as they reach the delivery loop.
async fn run_load<T, R>(service: &CachedWebservice, resource: Resource<T>, render: R) -> Result<()>
where
  T: Send + 'static,
  R: Fn(&T) -> String,
{
  let mut events = EventHandler::new(Duration::from_secs(1));
  let started = Instant::now();

  service
    .load(resource)
    .deliver(&events.sender(), Event::Update);

  while let Some(event) = events.next().await {
    match event {
      Event::Update(Update::Cached(value)) => {
        println!("[cache]\n{}", render(&value));
      }
      Event::Update(Update::Fresh(value)) => {
        println!("[network]\n{}", render(&value));
        return Ok(());
      }
      Event::Update(Update::Failed(e)) => {
        return Err(eyre!(e).wrap_err("Network load failed"));
      }
      Event::Tick => {
        eprintln!("waiting for network ({}s)", started.elapsed().as_secs());
      }
    }
  }

  Err(eyre!("Delivery channel closed before the network result arrived"))
}

/// A body only makes sense for POST; GET requests never carry one.
fn request_method(method: MethodArg, body: Option<String>) -> Result<HttpMethod> {
  match (method, body) {
    (MethodArg::Get, Some(_)) => Err(eyre!("--body requires --method post")),
    (MethodArg::Get, None) => Ok(HttpMethod::Get),
    (MethodArg::Post, body) => Ok(HttpMethod::Post(
      body.unwrap_or_default().into_bytes(),
    )),
  }
}

fn parse_url(s: &str) -> Result<Url> {
  Url::parse(s).map_err(|e| eyre!("Invalid URL {}: {}", s, e))
}

/// Log to the configured file, or stderr. RUST_LOG overrides the level.
fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

  match &config.file {
    Some(path) => {
      let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
      let dir = dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

      Ok(None)
    }
  }
}
