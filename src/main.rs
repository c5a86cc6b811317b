//! CLI entry point for the anime downloader.

use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

mod app;
mod cli;

use cli::Args;

/// Process outcome, mapped onto the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    /// Anime not found, or an unexpected error.
    Failure,
    /// The watch page decoder no longer matches the site.
    ResolverOutdated,
    /// Bad selection, naming scheme, batch spec or arguments.
    Config,
    /// At least one episode ended `FAILED`.
    Failed,
    /// Interrupted by SIGINT/SIGTERM.
    Cancelled,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::ResolverOutdated => 2,
            Self::Config => 3,
            Self::Failed => 4,
            Self::Cancelled => 130,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse before tracing so --help works without logs
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ProcessExit::Config.into(),
            };
        }
    };

    match app::runtime::run_downloader(args).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ProcessExit::Failure.into()
        }
    }
}
