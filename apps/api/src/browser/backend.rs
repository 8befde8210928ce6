//! Browser backend seam. The driver only talks to `BrowserBackend`; production
//! uses the WebDriver implementation, tests use a scripted in-process one.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::browser::locator::Locator;

/// Opaque id of a live browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub String);

/// Opaque reference to a located element, valid within its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BrowserError {
    #[error("no element matches {0}")]
    NoSuchElement(String),

    #[error("element cannot be used: {0}")]
    NotInteractable(String),

    #[error("stale element reference")]
    StaleElement,

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("rate limit or bot challenge page: {0}")]
    Challenge(String),

    #[error("form is no longer available: {0}")]
    FormGone(String),

    #[error("site requires sign-in: {0}")]
    AuthRequired(String),

    #[error("browser session is gone: {0}")]
    SessionGone(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("webdriver error: {0}")]
    Protocol(String),
}

impl BrowserError {
    /// Worth another try after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrowserError::StaleElement
                | BrowserError::Timeout(_)
                | BrowserError::Navigation(_)
                | BrowserError::Challenge(_)
                | BrowserError::Transport(_)
        )
    }

    /// Affects one control only; the rest of the form can still be filled.
    pub fn is_field_local(&self) -> bool {
        matches!(
            self,
            BrowserError::NoSuchElement(_) | BrowserError::NotInteractable(_)
        )
    }
}

#[async_trait]
pub trait BrowserBackend: Send + Sync {
    async fn new_session(&self) -> Result<SessionHandle, BrowserError>;

    async fn navigate(&self, session: &SessionHandle, url: &str) -> Result<(), BrowserError>;

    async fn page_source(&self, session: &SessionHandle) -> Result<String, BrowserError>;

    async fn find(
        &self,
        session: &SessionHandle,
        locator: &Locator,
    ) -> Result<ElementRef, BrowserError>;

    /// Clears the control, then types `text`.
    async fn type_text(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        text: &str,
    ) -> Result<(), BrowserError>;

    /// Picks `option` inside a `<select>` or a radio group container.
    async fn choose_option(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        option: &str,
    ) -> Result<(), BrowserError>;

    async fn set_checked(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        checked: bool,
    ) -> Result<(), BrowserError>;

    async fn attach_file(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        path: &Path,
    ) -> Result<(), BrowserError>;

    async fn click(&self, session: &SessionHandle, element: &ElementRef)
        -> Result<(), BrowserError>;

    async fn close(&self, session: &SessionHandle) -> Result<(), BrowserError>;
}
