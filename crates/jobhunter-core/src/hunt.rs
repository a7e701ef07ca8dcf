use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classifier::{Classifier, ClassifierConfig};
use crate::config::RunConfig;
use crate::crawler::Crawler;
use crate::delivery::deliver_segments;
use crate::error::AppError;
use crate::extract::PostingExtractor;
use crate::filter::RelevanceFilter;
use crate::models::{RunSummary, SegmentSet};
use crate::navigator::{NavigatorConfig, PageNavigator};
use crate::reporter::{Phase, RunEvent, RunReporter, TracingRunReporter};
use crate::scroll::ScrollSettings;
use crate::segment::segment;
use crate::store::DedupStore;
use crate::traits::{Generator, Notifier, Page};

/// Scroll attempts used to reveal pagination controls.
const REVEAL_SCROLL_ATTEMPTS: u32 = 3;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every channel received the summary; `count` postings were marked delivered.
    Delivered { count: usize },
    /// Nothing new to report. The channels were told so.
    NothingToReport,
    Failed { kind: &'static str },
    Interrupted { phase: Phase },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Delivered { .. } | RunOutcome::NothingToReport)
    }
}

enum Halt {
    Interrupted(Phase),
    Failed(AppError),
}

impl From<AppError> for Halt {
    fn from(e: AppError) -> Self {
        Halt::Failed(e)
    }
}

/// Runs the whole pipeline once: crawl, deduplicate, cap, classify,
/// select, deliver, mark delivered.
///
/// Generic over the page driver, the generator and the channels, so the
/// whole flow runs against mocks in tests.
pub struct HuntService<P, G, N, R = TracingRunReporter>
where
    P: Page,
    G: Generator,
    N: Notifier,
    R: RunReporter,
{
    page: P,
    crawler: Crawler,
    classifier: Classifier<G>,
    filter: RelevanceFilter,
    store: DedupStore,
    channels: Vec<N>,
    max_postings_per_run: usize,
    notes: Vec<String>,
    reporter: R,
}

impl<P, G, N> HuntService<P, G, N>
where
    P: Page,
    G: Generator,
    N: Notifier,
{
    pub fn new(
        page: P,
        crawler: Crawler,
        classifier: Classifier<G>,
        filter: RelevanceFilter,
        store: DedupStore,
        channels: Vec<N>,
        max_postings_per_run: usize,
    ) -> Self {
        Self {
            page,
            crawler,
            classifier,
            filter,
            store,
            channels,
            max_postings_per_run,
            notes: Vec::new(),
            reporter: TracingRunReporter,
        }
    }

    /// Wire every component from a validated run configuration.
    ///
    /// Opens (and prunes) the dedup store.
    pub fn from_config(
        config: &RunConfig,
        page: P,
        generator: G,
        channels: Vec<N>,
    ) -> Result<Self, AppError> {
        config.validate()?;

        let navigator = PageNavigator::new(NavigatorConfig {
            max_pages: config.max_pages_per_site,
            settle: config.page_settle(),
            reveal: ScrollSettings::new(REVEAL_SCROLL_ATTEMPTS, config.scroll_pause()),
        });
        let extractor = PostingExtractor::new(
            config.keywords.clone(),
            config.excluded_keywords.clone(),
            ScrollSettings {
                pause: config.scroll_pause(),
                ..ScrollSettings::default()
            },
        );
        let crawler = Crawler::new(config.targets.clone(), navigator, extractor);

        let classifier = Classifier::new(
            generator,
            ClassifierConfig {
                batch_size: config.batch_size,
                batch_delay: config.batch_delay(),
                base_prompt: config.base_prompt.clone(),
            },
        );

        let store = DedupStore::open(config.storage_path.clone(), config.retention())?;

        let mut service = Self::new(
            page,
            crawler,
            classifier,
            RelevanceFilter::new(config.threshold()?),
            store,
            channels,
            config.max_postings_per_run,
        );
        if let Some(warning) = config.base_prompt_warning() {
            tracing::warn!("{warning}");
            service.notes.push(warning);
        }
        Ok(service)
    }
}

impl<P, G, N, R> HuntService<P, G, N, R>
where
    P: Page,
    G: Generator,
    N: Notifier,
    R: RunReporter,
{
    pub fn with_reporter<R2: RunReporter>(self, reporter: R2) -> HuntService<P, G, N, R2> {
        HuntService {
            page: self.page,
            crawler: self.crawler,
            classifier: self.classifier,
            filter: self.filter,
            store: self.store,
            channels: self.channels,
            max_postings_per_run: self.max_postings_per_run,
            notes: self.notes,
            reporter,
        }
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    /// Give the page driver back, e.g. to shut the browser down.
    pub fn into_page(self) -> P {
        self.page
    }

    /// Run the pipeline once. Never returns an error: failures are reported
    /// to the channels and summarized in the outcome.
    pub async fn run(&mut self, cancel: &CancellationToken) -> RunOutcome {
        let run_id = Uuid::new_v4();
        self.reporter.report(RunEvent::Started {
            run_id,
            targets: self.crawler.targets().len(),
        });

        let outcome = match self.execute(cancel).await {
            Ok(count) => RunOutcome::Delivered { count },
            Err(Halt::Interrupted(phase)) => {
                self.reporter.report(RunEvent::Interrupted { phase });
                RunOutcome::Interrupted { phase }
            }
            Err(Halt::Failed(AppError::NoNewPostings)) => {
                tracing::info!("No new postings found");
                self.report_error(&AppError::NoNewPostings).await;
                RunOutcome::NothingToReport
            }
            Err(Halt::Failed(e)) => {
                let error = e.to_string();
                self.reporter.report(RunEvent::Failed {
                    kind: e.kind(),
                    error: &error,
                });
                self.report_error(&e).await;
                RunOutcome::Failed { kind: e.kind() }
            }
        };

        self.reporter.report(RunEvent::Finished { run_id });
        outcome
    }

    async fn execute(&mut self, cancel: &CancellationToken) -> Result<usize, Halt> {
        self.enter(Phase::Crawl, cancel)?;
        let found = self.crawler.crawl(&self.page).await?;
        let crawled = found.len();
        self.reporter.report(RunEvent::Crawled { found: crawled });
        if found.is_empty() {
            return Err(AppError::NoNewPostings.into());
        }

        self.enter(Phase::Deduplicate, cancel)?;
        let before = found.len();
        let mut postings = self.store.filter_undelivered(found);
        self.reporter.report(RunEvent::DuplicatesRemoved {
            removed: before - postings.len(),
            remaining: postings.len(),
        });
        if postings.is_empty() {
            return Err(AppError::NoNewPostings.into());
        }

        self.enter(Phase::Cap, cancel)?;
        let mut notes = self.notes.clone();
        let cap = self.max_postings_per_run;
        let deferred = postings.len().saturating_sub(cap);
        if deferred > 0 {
            postings.truncate(cap);
            notes.push(format!(
                "Maximum of {cap} jobs per run reached, {deferred} will be analyzed in the next run."
            ));
            self.reporter.report(RunEvent::Deferred { deferred, cap });
        }

        self.enter(Phase::Classify, cancel)?;
        self.classifier.classify(&mut postings).await?;

        self.enter(Phase::Select, cancel)?;
        let classified = postings.len();
        let selected = self.filter.select(postings)?;
        self.reporter.report(RunEvent::Selected {
            selected: selected.len(),
            classified,
        });
        if selected.is_empty() {
            return Err(AppError::NoNewPostings.into());
        }
        let summary = RunSummary::new(selected, crawled)
            .with_deferred(deferred)
            .with_notes(notes.join("\n"));

        self.enter(Phase::Deliver, cancel)?;
        self.deliver(&summary).await?;

        self.enter(Phase::MarkDelivered, cancel)?;
        self.store.mark_delivered(summary.postings())?;
        self.reporter.report(RunEvent::MarkedDelivered {
            count: summary.filtered_count(),
        });

        Ok(summary.filtered_count())
    }

    fn enter(&self, phase: Phase, cancel: &CancellationToken) -> Result<(), Halt> {
        if cancel.is_cancelled() {
            return Err(Halt::Interrupted(phase));
        }
        self.reporter.report(RunEvent::PhaseStarted { phase });
        Ok(())
    }

    /// Send the summary to every channel. Fails if any channel failed,
    /// after all of them were tried.
    async fn deliver(&self, summary: &RunSummary) -> Result<(), AppError> {
        if self.channels.is_empty() {
            return Err(AppError::Notification(
                "No notification channels configured".into(),
            ));
        }

        let mut failed = Vec::new();
        for channel in &self.channels {
            let result = match segment(summary, channel.max_message_length()) {
                Ok(segments) => deliver_segments(channel, &segments)
                    .await
                    .map(|()| segments.parts.len()),
                Err(e) => Err(e),
            };
            match result {
                Ok(parts) => self.reporter.report(RunEvent::ChannelDelivered {
                    channel: channel.name(),
                    parts,
                }),
                Err(e) => {
                    let error = e.to_string();
                    self.reporter.report(RunEvent::ChannelFailed {
                        channel: channel.name(),
                        error: &error,
                    });
                    failed.push(channel.name().to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(AppError::Notification(format!(
                "Delivery failed on {}",
                failed.join(", ")
            )))
        }
    }

    /// Tell the user how the run ended. Failures here are only logged.
    async fn report_error(&self, error: &AppError) {
        if !error.is_reportable() {
            tracing::error!(error = ?error, "Application failed");
        }
        let message = SegmentSet::single(error.user_message());
        for channel in &self.channels {
            if let Err(e) = deliver_segments(channel, &message).await {
                tracing::warn!(channel = channel.name(), error = %e, "Could not report error");
            }
        }
    }
}
