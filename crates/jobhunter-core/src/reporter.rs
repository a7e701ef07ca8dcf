use std::fmt;

use uuid::Uuid;

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Crawl,
    Deduplicate,
    Cap,
    Classify,
    Select,
    Deliver,
    MarkDelivered,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Crawl => "crawl",
            Phase::Deduplicate => "deduplicate",
            Phase::Cap => "cap",
            Phase::Classify => "classify",
            Phase::Select => "select",
            Phase::Deliver => "deliver",
            Phase::MarkDelivered => "mark_delivered",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the hunt service for monitoring/logging.
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    Started {
        run_id: Uuid,
        targets: usize,
    },
    PhaseStarted {
        phase: Phase,
    },
    Crawled {
        found: usize,
    },
    DuplicatesRemoved {
        removed: usize,
        remaining: usize,
    },
    Deferred {
        deferred: usize,
        cap: usize,
    },
    Selected {
        selected: usize,
        classified: usize,
    },
    ChannelDelivered {
        channel: &'a str,
        parts: usize,
    },
    ChannelFailed {
        channel: &'a str,
        error: &'a str,
    },
    MarkedDelivered {
        count: usize,
    },
    Interrupted {
        phase: Phase,
    },
    Failed {
        kind: &'a str,
        error: &'a str,
    },
    Finished {
        run_id: Uuid,
    },
}

/// Trait for receiving run events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Started { run_id, targets } => {
                tracing::info!(%run_id, targets, "Run started");
            }
            RunEvent::PhaseStarted { phase } => {
                tracing::info!(%phase, "Starting phase");
            }
            RunEvent::Crawled { found } => {
                tracing::info!(found, "Crawl complete");
            }
            RunEvent::DuplicatesRemoved { removed, remaining } => {
                tracing::info!(removed, remaining, "Filtered duplicate postings");
            }
            RunEvent::Deferred { deferred, cap } => {
                tracing::info!(deferred, cap, "Per-run limit reached, deferring postings");
            }
            RunEvent::Selected {
                selected,
                classified,
            } => {
                tracing::info!(selected, classified, "Selected postings to report");
            }
            RunEvent::ChannelDelivered { channel, parts } => {
                tracing::info!(%channel, parts, "Summary delivered");
            }
            RunEvent::ChannelFailed { channel, error } => {
                tracing::warn!(%channel, %error, "Channel delivery failed");
            }
            RunEvent::MarkedDelivered { count } => {
                tracing::info!(count, "Marked postings as delivered");
            }
            RunEvent::Interrupted { phase } => {
                tracing::info!(%phase, "Run interrupted");
            }
            RunEvent::Failed { kind, error } => {
                tracing::error!(%kind, %error, "Run failed");
            }
            RunEvent::Finished { run_id } => {
                tracing::info!(%run_id, "Run finished");
            }
        }
    }
}
