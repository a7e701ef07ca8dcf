pub mod classifier;
pub mod config;
pub mod crawler;
pub mod delivery;
pub mod error;
pub mod extract;
pub mod filter;
pub mod hunt;
pub mod models;
pub mod navigator;
pub mod reporter;
pub mod scroll;
pub mod segment;
pub mod store;
pub mod traits;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use classifier::{Classifier, ClassifierConfig};
pub use config::RunConfig;
pub use crawler::Crawler;
pub use error::AppError;
pub use filter::RelevanceFilter;
pub use hunt::{HuntService, RunOutcome};
pub use models::{Posting, RelevanceStatus, RunSummary, SegmentSet};
pub use navigator::{NextPageStrategy, PageNavigator};
pub use reporter::{Phase, RunEvent, RunReporter, TracingRunReporter};
pub use store::DedupStore;
pub use traits::{Generator, Notifier, Page, PageElement};
