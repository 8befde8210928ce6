//! W3C WebDriver backend: drives Chrome through chromedriver or a Selenium grid.
//!
//! Every command is one HTTP request; WebDriver error codes are mapped onto
//! `BrowserError` so the driver can tell transient hiccups from dead forms.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::debug;

use crate::browser::backend::{BrowserBackend, BrowserError, ElementRef, SessionHandle};
use crate::browser::locator::Locator;

/// W3C element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Clone)]
pub struct WebDriverSettings {
    pub url: String,
    pub headless: bool,
    /// HTTP timeout per command; the driver applies its own, shorter bound on top.
    pub request_timeout: Duration,
}

#[derive(Clone)]
pub struct WebDriverBackend {
    client: Client,
    base_url: String,
    headless: bool,
}

impl WebDriverBackend {
    pub fn new(settings: WebDriverSettings) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| BrowserError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            headless: settings.headless,
        })
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BrowserError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let payload: Value = response.json().await.map_err(transport_error)?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if !status.is_success() {
            let code = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            debug!("WebDriver {method} {path} -> {status}: {code}");
            return Err(map_error_code(code, message));
        }
        Ok(value)
    }

    fn element_path(session: &SessionHandle, element: &ElementRef, suffix: &str) -> String {
        format!("/session/{}/element/{}{}", session.0, element.0, suffix)
    }
}

/// Chrome arguments for an unattended container run.
pub fn chrome_args(headless: bool) -> Vec<&'static str> {
    let mut args = vec![
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--window-size=1366,900",
    ];
    if headless {
        args.push("--headless=new");
    }
    args
}

fn capabilities(headless: bool) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "pageLoadStrategy": "normal",
                "goog:chromeOptions": { "args": chrome_args(headless) }
            }
        }
    })
}

fn transport_error(e: reqwest::Error) -> BrowserError {
    if e.is_timeout() {
        BrowserError::Timeout(e.to_string())
    } else {
        BrowserError::Transport(e.to_string())
    }
}

/// Maps a W3C error code (the `error` field of a failed response) to `BrowserError`.
pub fn map_error_code(code: &str, message: &str) -> BrowserError {
    let detail = if message.is_empty() {
        code.to_string()
    } else {
        message.lines().next().unwrap_or(message).to_string()
    };
    match code {
        "no such element" => BrowserError::NoSuchElement(detail),
        "element not interactable" | "element click intercepted" | "invalid element state" => {
            BrowserError::NotInteractable(detail)
        }
        "stale element reference" => BrowserError::StaleElement,
        "timeout" | "script timeout" => BrowserError::Timeout(detail),
        "invalid session id" | "no such window" | "session not created" => {
            BrowserError::SessionGone(detail)
        }
        "unknown error" if message.contains("net::ERR_") => BrowserError::Navigation(detail),
        _ => BrowserError::Protocol(format!("{code}: {detail}")),
    }
}

/// Quotes `s` as an XPath 1.0 string literal, including values holding both quote kinds.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Option of a `<select>` by text or value, or a radio input by value or label text.
fn option_xpath(option: &str) -> String {
    let lit = xpath_literal(option);
    format!(
        ".//option[normalize-space(.)={lit}] | .//option[@value={lit}] \
         | .//input[@type='radio' and @value={lit}] \
         | .//label[normalize-space(.)={lit}]"
    )
}

fn element_from(value: &Value) -> Result<ElementRef, BrowserError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementRef(id.to_string()))
        .ok_or_else(|| BrowserError::Protocol("response carries no element reference".to_string()))
}

#[async_trait]
impl BrowserBackend for WebDriverBackend {
    async fn new_session(&self) -> Result<SessionHandle, BrowserError> {
        let value = self
            .command(Method::POST, "/session", Some(capabilities(self.headless)))
            .await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol("new session response has no sessionId".to_string()))?;
        debug!("WebDriver session {id} started");
        Ok(SessionHandle(id.to_string()))
    }

    async fn navigate(&self, session: &SessionHandle, url: &str) -> Result<(), BrowserError> {
        self.command(
            Method::POST,
            &format!("/session/{}/url", session.0),
            Some(json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    async fn page_source(&self, session: &SessionHandle) -> Result<String, BrowserError> {
        let value = self
            .command(Method::GET, &format!("/session/{}/source", session.0), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find(
        &self,
        session: &SessionHandle,
        locator: &Locator,
    ) -> Result<ElementRef, BrowserError> {
        let (using, value) = locator.webdriver_query();
        let found = self
            .command(
                Method::POST,
                &format!("/session/{}/element", session.0),
                Some(json!({ "using": using, "value": value })),
            )
            .await
            .map_err(|e| match e {
                BrowserError::NoSuchElement(_) => BrowserError::NoSuchElement(locator.to_string()),
                other => other,
            })?;
        element_from(&found)
    }

    async fn type_text(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        text: &str,
    ) -> Result<(), BrowserError> {
        self.command(
            Method::POST,
            &Self::element_path(session, element, "/clear"),
            Some(json!({})),
        )
        .await?;
        self.command(
            Method::POST,
            &Self::element_path(session, element, "/value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn choose_option(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        option: &str,
    ) -> Result<(), BrowserError> {
        let found = self
            .command(
                Method::POST,
                &Self::element_path(session, element, "/element"),
                Some(json!({ "using": "xpath", "value": option_xpath(option) })),
            )
            .await
            .map_err(|e| match e {
                BrowserError::NoSuchElement(_) => {
                    BrowserError::NoSuchElement(format!("option '{option}'"))
                }
                other => other,
            })?;
        let choice = element_from(&found)?;
        self.click(session, &choice).await
    }

    async fn set_checked(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        checked: bool,
    ) -> Result<(), BrowserError> {
        let selected = self
            .command(
                Method::GET,
                &Self::element_path(session, element, "/selected"),
                None,
            )
            .await?
            .as_bool()
            .unwrap_or(false);
        if selected != checked {
            self.click(session, element).await?;
        }
        Ok(())
    }

    async fn attach_file(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        path: &Path,
    ) -> Result<(), BrowserError> {
        // file inputs take the local path as typed text
        self.command(
            Method::POST,
            &Self::element_path(session, element, "/value"),
            Some(json!({ "text": path.to_string_lossy() })),
        )
        .await?;
        Ok(())
    }

    async fn click(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
    ) -> Result<(), BrowserError> {
        self.command(
            Method::POST,
            &Self::element_path(session, element, "/click"),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn close(&self, session: &SessionHandle) -> Result<(), BrowserError> {
        self.command(Method::DELETE, &format!("/session/{}", session.0), None)
            .await?;
        debug!("WebDriver session {} closed", session.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("3-5"), "'3-5'");
        assert_eq!(xpath_literal("I'm in"), "\"I'm in\"");
        assert_eq!(
            xpath_literal("it's \"fine\""),
            "concat('it', \"'\", 's \"fine\"')"
        );
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            map_error_code("no such element", "Unable to locate element: #x"),
            BrowserError::NoSuchElement("Unable to locate element: #x".to_string())
        );
        assert_eq!(map_error_code("stale element reference", ""), BrowserError::StaleElement);
        assert!(map_error_code("timeout", "page load").is_transient());
        assert!(matches!(
            map_error_code("unknown error", "net::ERR_NAME_NOT_RESOLVED\n(Session info)"),
            BrowserError::Navigation(_)
        ));
        assert!(matches!(
            map_error_code("invalid session id", ""),
            BrowserError::SessionGone(_)
        ));
        assert!(matches!(
            map_error_code("javascript error", "boom"),
            BrowserError::Protocol(_)
        ));
    }

    #[test]
    fn test_capabilities_request_headless_chrome() {
        let caps = capabilities(true);
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
        assert!(args.iter().any(|a| a == "--no-sandbox"));
        assert!(!chrome_args(false).contains(&"--headless=new"));
    }

    #[test]
    fn test_element_reference_extraction() {
        let value = json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(element_from(&value), Ok(ElementRef("abc-123".to_string())));
        assert!(element_from(&json!({})).is_err());
    }
}
