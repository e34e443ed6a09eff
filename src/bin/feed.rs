use clap::Parser;
use log::LevelFilter;
use rxnet::feed::{Feed, FeedStore, DEFAULT_LIMIT};
use rxnet::{ClientConfig, ReqwestTransport, ResponseCache, Scheduler, Session};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let opts: Opts = Opts::parse();
    let _ = init_logging(opts.verbose);

    let config = ClientConfig::default().with_request_timeout(Duration::from_secs(opts.timeout));
    let session = Session::new(
        ReqwestTransport::new(&config)?,
        ResponseCache::new(),
        Scheduler::current()?,
    );
    let store = FeedStore::new(&opts.store)?;
    let feed = Feed::open(session, store, opts.limit)?;

    let refresh = feed.refresh(&opts.url).await?;

    log::info!("Status: {}", refresh.status);
    log::info!("New records: {}", refresh.added);
    if refresh.undecodable {
        log::warn!("The response body was not a list of records");
    }
    if let Some(last_modified) = refresh.last_modified {
        log::info!("Last modified: {}", last_modified);
    }

    for record in feed.current() {
        println!("{}", record.summary());
    }

    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Logging initialization error")]
    LogInit(#[from] log::SetLoggerError),
    #[error("HTTP client error")]
    Client(#[from] reqwest::Error),
    #[error("Runtime error")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
    #[error("Feed error")]
    Feed(#[from] rxnet::feed::Error),
}

#[derive(Parser)]
#[clap(name = "feed", version, author)]
struct Opts {
    /// Level of verbosity
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,
    /// The endpoint returning a JSON array of records
    #[clap(long)]
    url: String,
    /// The directory for the stored records
    #[clap(long)]
    store: String,
    /// Maximum number of records to keep
    #[clap(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,
    /// Request timeout in seconds
    #[clap(long, default_value_t = 10)]
    timeout: u64,
}

fn select_log_level_filter(verbosity: i32) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(verbosity: i32) -> Result<(), log::SetLoggerError> {
    simplelog::TermLogger::init(
        select_log_level_filter(verbosity),
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
}
