//! quakemap - earthquake maps from the USGS event feed.
//!
//! Renders a map view as SVG, prints the feed query behind it, or keeps a
//! map file current while the view is steered from stdin.

use std::future::Future;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, LinesStream};
use tracing::{error, info, warn};

use quakemap::client::{EventFeed, FeedClient};
use quakemap::controller::{RefreshEvent, ViewController};
use quakemap::output;
use quakemap::projection::Viewport;
use quakemap::query::FeedQuery;
use quakemap::surface::SvgSurface;

mod cli;

use cli::{Cli, Command, WatchLine};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Render(args) => block_on(cmd_render(args)),
        Command::Query(args) => block_on(cmd_query(args)),
        Command::Watch(args) => block_on(cmd_watch(args)),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(future)
}

/// Execute the `render` command - one refresh, then write the SVG.
async fn cmd_render(args: cli::RenderArgs) -> Result<()> {
    let options = args.view.to_options();
    let client = FeedClient::new().context("failed to create feed client")?;

    let mut surface = SvgSurface::new(options.size);
    surface.set_title(args.view.title());

    let mut view = ViewController::new(options, client, surface);
    view.initialize();
    let outcome = view.refresh().await.context("failed to refresh map")?;
    info!("{:?}", outcome);

    let svg = view.surface().to_svg();
    match &args.output {
        Some(path) => {
            std::fs::write(path, svg)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote map to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(svg.as_bytes())?;
        }
    }
    Ok(())
}

/// Execute the `query` command - print the feed URL or the events.
async fn cmd_query(args: cli::QueryArgs) -> Result<()> {
    let options = args.view.to_options();
    let config = &options.view;
    let viewport = Viewport::new(config.center, config.zoom, options.size);

    let query = FeedQuery {
        end: config.end_date,
        window_days: config.window_days,
        bounds: Some(viewport.bounds()),
        event_type: config.event_type.clone(),
    };
    let url = query
        .build_at(&options.feed_url, Utc::now())
        .context("invalid view")?;

    let stdout = io::stdout();
    if args.url_only {
        writeln!(stdout.lock(), "{url}")?;
        return Ok(());
    }

    let client = FeedClient::new().context("failed to create feed client")?;
    let feed = client
        .fetch(&url)
        .await
        .context("failed to fetch event feed")?;
    let events = feed.events();
    info!("{} events", events.len());

    let mut handle = stdout.lock();
    output::write_events(&mut handle, &events, args.format, &options.scale)?;
    Ok(())
}

/// Execute the `watch` command - keep the map file current while stdin
/// steers the view.
async fn cmd_watch(args: cli::WatchArgs) -> Result<()> {
    let options = args.view.to_options();
    let client = FeedClient::new().context("failed to create feed client")?;

    let mut surface = SvgSurface::new(options.size).with_output(&args.output);
    surface.set_title(args.view.title());

    let (handle, task) = ViewController::new(options, client, surface).spawn();
    let mut events = BroadcastStream::new(handle.subscribe());
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    info!("watching; map is written to {}", args.output.display());

    loop {
        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else { break };
                let line = line.context("failed to read stdin")?;
                match cli::parse_watch_line(&line) {
                    Ok(Some(WatchLine::Command(command))) => handle.send(command)?,
                    Ok(Some(WatchLine::Quit)) => break,
                    Ok(None) => {}
                    Err(e) => warn!("{e}"),
                }
            }
            Some(event) = events.next() => match event {
                Ok(RefreshEvent::Requested { token, url }) => info!("refresh {token}: {url}"),
                Ok(RefreshEvent::Rendered { token, markers }) => {
                    info!("refresh {token}: {markers} events, map updated");
                }
                Ok(RefreshEvent::Unchanged { token }) => info!("refresh {token}: no events"),
                Ok(RefreshEvent::Discarded { token }) => info!("refresh {token}: superseded"),
                Ok(RefreshEvent::Failed { token, error }) => warn!("refresh {token} failed: {error}"),
                Err(BroadcastStreamRecvError::Lagged(n)) => warn!("missed {n} refresh events"),
            },
        }
    }

    drop(handle);
    task.await.context("view controller panicked")?;
    Ok(())
}
