//! Runs anime jobs: lookup, selection, then episodes oldest-first.

use std::sync::Arc;

use anime_downloader_core::{
    AcquireError, AnimeCatalog, AnimeJob, CatalogError, DownloadObserver, DownloadState,
    EpisodeDownloader, EpisodeUnit,
};
use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::app::exit_handler::JobOutcome;

/// Runs `jobs` with at most `concurrency` anime in flight.
///
/// Outcomes come back in job order.
pub(crate) async fn run_jobs(
    jobs: Vec<AnimeJob>,
    catalog: Arc<AnimeCatalog>,
    downloader: Arc<EpisodeDownloader>,
    observer: Arc<dyn DownloadObserver>,
    concurrency: usize,
) -> Result<Vec<JobOutcome>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .context("job semaphore closed")?;

        let catalog = Arc::clone(&catalog);
        let downloader = Arc::clone(&downloader);
        let observer = Arc::clone(&observer);

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            process_job(&job, &catalog, &downloader, observer.as_ref()).await
        }));
    }

    debug!(task_count = handles.len(), "waiting for anime jobs");

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!(error = %e, "anime job panicked");
                outcomes.push(JobOutcome::Error);
            }
        }
    }
    Ok(outcomes)
}

/// Downloads the selected episodes of one anime.
///
/// `FAILED` stops this anime; later episodes are not requested. A decoder
/// mismatch cancels every other job as well.
#[instrument(skip_all, fields(anime = %job.name))]
pub(crate) async fn process_job(
    job: &AnimeJob,
    catalog: &AnimeCatalog,
    downloader: &EpisodeDownloader,
    observer: &dyn DownloadObserver,
) -> JobOutcome {
    let cancel = downloader.cancellation_token();

    let lookup = tokio::select! {
        biased;
        () = cancel.cancelled() => return JobOutcome::Cancelled,
        lookup = catalog.info(&job.name) => lookup,
    };
    let info = match lookup {
        Ok(info) => info,
        Err(e @ CatalogError::NotFound { .. }) => {
            error!("{e}");
            return JobOutcome::NotFound;
        }
        Err(e) => {
            error!(error = %e, "anime lookup failed");
            return JobOutcome::Error;
        }
    };

    let episodes = job.selection.select(info.episodes);
    if episodes.is_empty() {
        warn!(
            selection = %job.selection,
            available = info.episodes,
            "selection matches no episodes"
        );
        return JobOutcome::Completed;
    }
    info!(
        count = episodes.len(),
        dest_dir = %job.dest_dir.display(),
        "downloading episodes"
    );

    for episode in episodes {
        if cancel.is_cancelled() {
            return JobOutcome::Cancelled;
        }

        let unit = EpisodeUnit::new(&info.name, episode, &job.dest_dir, job.naming.clone());
        match downloader.acquire_with_observer(&unit, observer).await {
            Ok(DownloadState::Failed) => {
                warn!(episode, "episode failed, skipping the rest of this anime");
                return JobOutcome::Failed;
            }
            Ok(DownloadState::Downloaded | DownloadState::AssignedOrDone) => {}
            Err(e @ AcquireError::ResolverOutdated { .. }) => {
                error!("{e}");
                cancel.cancel();
                return JobOutcome::ResolverOutdated;
            }
            Err(AcquireError::Cancelled { .. }) => return JobOutcome::Cancelled,
            Err(e) => {
                error!(error = %e, "episode aborted");
                return JobOutcome::Failed;
            }
        }
    }

    JobOutcome::Completed
}
