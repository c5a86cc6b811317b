pub(crate) mod exit_handler;
pub(crate) mod job_runner;
pub(crate) mod progress;
pub(crate) mod runtime;
pub(crate) mod signals;
pub(crate) mod terminal;
