#[cfg(feature = "browser")]
pub mod browser;
pub mod llm;
pub mod notify;

#[cfg(feature = "browser")]
pub use browser::{ChromiumElement, ChromiumPage};
pub use llm::OpenAiGenerator;
pub use notify::{Channel, ConsoleNotifier, TelegramNotifier};
