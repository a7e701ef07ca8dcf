use std::future::Future;

use crate::error::AppError;

/// A single element handle on a rendered page.
pub trait PageElement: Send + Sync {
    /// Visible text of the element.
    fn text(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    fn attribute(&self, name: &str)
    -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    /// Names of every attribute present on the element.
    fn attribute_names(&self) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Link target resolved against the page address (`el.href`).
    fn href(&self) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    fn click(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    fn is_visible(&self) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// `scrollHeight` of the element, for scrollable containers.
    fn scroll_height(&self) -> impl Future<Output = Result<f64, AppError>> + Send;

    /// Scroll the element's content to its end.
    fn scroll_to_end(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A browser tab driven by the crawler.
pub trait Page: Send + Sync {
    type Element: PageElement;

    fn navigate(&self, url: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn current_url(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    fn query_all(
        &self,
        selector: &str,
    ) -> impl Future<Output = Result<Vec<Self::Element>, AppError>> + Send;

    /// Evaluate a script in the page and return its JSON value.
    fn evaluate(
        &self,
        script: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// Produces free text for a prompt using an LLM.
pub trait Generator: Send + Sync + Clone {
    /// Returns the raw response text, which may be empty.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// A channel that delivers text messages to the user.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Longest message the channel accepts in one delivery.
    fn max_message_length(&self) -> usize;

    fn deliver(&self, text: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}
