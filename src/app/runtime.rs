//! Mode selection and wiring of the library pieces.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use anime_downloader_core::http_client::{
    HttpTimeouts, MEDIA_CONNECT_TIMEOUT_SECS, PAGE_CONNECT_TIMEOUT_SECS, build_http_client,
};
use anime_downloader_core::{
    AnimeCatalog, AnimeHeavenResolver, AnimeJob, EpisodeDownloader, HttpClient, ResolveOutcome,
    Selection, SiteConfig, decode_watch_page, load_batch,
};
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::ProcessExit;
use crate::app::{exit_handler, job_runner, progress, signals, terminal};
use crate::cli::Args;

pub(crate) async fn run_downloader(args: Args) -> Result<ProcessExit> {
    if let Some(page_file) = &args.test {
        // The decode pipeline reports each stage at debug level
        terminal::init_tracing("debug", true);
        return run_page_test(page_file, &args);
    }

    terminal::init_tracing(args.default_log_level(), false);
    debug!(?args, "CLI arguments parsed");

    let site = SiteConfig::with_base_url(args.base_url.trim_end_matches('/'));

    if args.wants_download() {
        run_download(&args, site).await
    } else {
        run_search(&args, site).await
    }
}

fn run_page_test(page_file: &Path, args: &Args) -> Result<ProcessExit> {
    let body = std::fs::read_to_string(page_file)
        .with_context(|| format!("cannot read page file '{}'", page_file.display()))?;
    let site = SiteConfig::with_base_url(args.base_url.trim_end_matches('/'));

    Ok(match decode_watch_page(&body, &site) {
        ResolveOutcome::Resolved(resolved) => {
            println!("{}", resolved.url);
            ProcessExit::Success
        }
        ResolveOutcome::RateLimited => {
            error!("page is the site's abuse protection notice");
            ProcessExit::Failure
        }
        ResolveOutcome::ParseFailed(failure) => {
            error!(%failure, "page does not decode");
            ProcessExit::ResolverOutdated
        }
    })
}

fn page_client(args: &Args, site: &SiteConfig) -> Result<reqwest::Client> {
    build_http_client(
        &site.user_agent,
        HttpTimeouts::from_secs(PAGE_CONNECT_TIMEOUT_SECS, args.page_timeout),
    )
    .context("cannot build HTTP client")
}

async fn run_search(args: &Args, site: SiteConfig) -> Result<ProcessExit> {
    let Some(query) = args.anime_name() else {
        error!("no anime name given (see --help)");
        return Ok(ProcessExit::Config);
    };

    let catalog = AnimeCatalog::with_client(page_client(args, &site)?, site);
    let results = catalog.search(&query).await?;
    if results.is_empty() {
        error!(query = %query, "no anime found");
        return Ok(ProcessExit::Failure);
    }

    for anime in results {
        println!("{}\n  - Episodes: {}", anime.name, anime.episodes);
    }
    Ok(ProcessExit::Success)
}

fn build_jobs(args: &Args) -> Option<Vec<AnimeJob>> {
    if let Some(config) = &args.config {
        return load_batch(config, &args.naming_scheme)
            .inspect_err(|e| error!("{e}"))
            .ok();
    }

    let Some(name) = args.anime_name() else {
        error!("no anime name given (see --help)");
        return None;
    };
    Some(vec![AnimeJob {
        name,
        dest_dir: args.dir.clone(),
        selection: args.episodes.clone().unwrap_or_else(Selection::all),
        naming: args.naming_scheme.clone(),
    }])
}

async fn run_download(args: &Args, site: SiteConfig) -> Result<ProcessExit> {
    // Validate everything before touching the network
    let Some(jobs) = build_jobs(args) else {
        return Ok(ProcessExit::Config);
    };
    info!(
        jobs = jobs.len(),
        retry_waits = %args.retry_waits,
        "starting downloads"
    );

    let page_client = page_client(args, &site)?;
    let media_client = HttpClient::with_timeouts(
        &site.user_agent,
        HttpTimeouts::from_secs(MEDIA_CONNECT_TIMEOUT_SECS, args.media_timeout),
    )
    .context("cannot build HTTP client")?;

    let cancel = CancellationToken::new();
    let listener = signals::spawn_signal_listener(cancel.clone());

    let resolver = Arc::new(AnimeHeavenResolver::with_client(page_client.clone(), site.clone()));
    let catalog = Arc::new(AnimeCatalog::with_client(page_client, site));
    let downloader = Arc::new(EpisodeDownloader::new(
        resolver,
        media_client,
        args.retry_waits.clone(),
        cancel.clone(),
    ));

    let show_progress = terminal::should_show_progress(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let observer = Arc::new(progress::ProgressObserver::new(show_progress));

    let outcomes = job_runner::run_jobs(
        jobs,
        catalog,
        downloader,
        observer,
        usize::from(args.jobs),
    )
    .await?;

    listener.abort();

    let exit = exit_handler::determine_exit_outcome(&outcomes);
    debug!(?outcomes, ?exit, "all jobs finished");
    Ok(exit)
}
