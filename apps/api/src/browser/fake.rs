//! Scripted in-process browser used by driver and engine tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::browser::backend::{BrowserBackend, BrowserError, ElementRef, SessionHandle};
use crate::browser::locator::Locator;

pub const FORM_PAGE: &str = "<html><body><form id='apply'>...</form></body></html>";
pub const CONFIRMATION_PAGE: &str = "<html><body><h1>Thank you for applying!</h1></body></html>";
pub const CHALLENGE_PAGE: &str = "<html><body>Checking your browser before accessing</body></html>";

/// Everything the fake browser was asked to do.
#[derive(Debug, Clone, Default)]
pub struct FakeLog {
    pub sessions_started: u32,
    pub open: Vec<String>,
    pub closed: Vec<String>,
    pub navigations: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub chosen: Vec<(String, String)>,
    pub checked: Vec<(String, bool)>,
    pub attached: Vec<(String, PathBuf)>,
    pub submit_clicks: u32,
}

#[derive(Default)]
struct FakeState {
    log: FakeLog,
    submitted: bool,
    challenges_left: u32,
    /// Locator value -> lookups that still fail before the control shows up.
    late: HashMap<String, u32>,
}

/// Elements whose locator value contains "submit" act as the submit control.
pub struct FakeBrowser {
    page: String,
    missing: HashSet<String>,
    hang_on_submit: bool,
    auth_wall: bool,
    state: Mutex<FakeState>,
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self {
            page: FORM_PAGE.to_string(),
            missing: HashSet::new(),
            hang_on_submit: false,
            auth_wall: false,
            state: Mutex::new(FakeState::default()),
        }
    }
}

impl FakeBrowser {
    /// Locator value that cannot be found on the page.
    pub fn without(mut self, selector: &str) -> Self {
        self.missing.insert(selector.to_string());
        self
    }

    /// The first `lookups` finds of `selector` fail as if the form were still rendering.
    pub fn appearing_after(self, selector: &str, lookups: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .late
            .insert(selector.to_string(), lookups);
        self
    }

    /// Clicking submit never returns.
    pub fn hanging_submit(mut self) -> Self {
        self.hang_on_submit = true;
        self
    }

    /// The first `loads` page reads show a bot challenge.
    pub fn challenged(self, loads: u32) -> Self {
        self.state.lock().unwrap().challenges_left = loads;
        self
    }

    pub fn behind_login(mut self) -> Self {
        self.auth_wall = true;
        self
    }

    pub fn log(&self) -> FakeLog {
        self.state.lock().unwrap().log.clone()
    }

    pub fn open_sessions(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .log
            .open
            .iter()
            .filter(|s| !state.log.closed.contains(s))
            .cloned()
            .collect()
    }

    fn check_open(&self, session: &SessionHandle) -> Result<(), BrowserError> {
        let state = self.state.lock().unwrap();
        if state.log.closed.contains(&session.0) || !state.log.open.contains(&session.0) {
            return Err(BrowserError::SessionGone(session.0.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserBackend for FakeBrowser {
    async fn new_session(&self) -> Result<SessionHandle, BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.log.sessions_started += 1;
        let id = format!("session-{}", state.log.sessions_started);
        state.log.open.push(id.clone());
        Ok(SessionHandle(id))
    }

    async fn navigate(&self, session: &SessionHandle, url: &str) -> Result<(), BrowserError> {
        self.check_open(session)?;
        self.state.lock().unwrap().log.navigations.push(url.to_string());
        Ok(())
    }

    async fn page_source(&self, session: &SessionHandle) -> Result<String, BrowserError> {
        self.check_open(session)?;
        let mut state = self.state.lock().unwrap();
        if state.submitted {
            return Ok(CONFIRMATION_PAGE.to_string());
        }
        if state.challenges_left > 0 {
            state.challenges_left -= 1;
            return Ok(CHALLENGE_PAGE.to_string());
        }
        if self.auth_wall {
            return Ok("<p>Please sign in to continue</p>".to_string());
        }
        Ok(self.page.clone())
    }

    async fn find(
        &self,
        session: &SessionHandle,
        locator: &Locator,
    ) -> Result<ElementRef, BrowserError> {
        self.check_open(session)?;
        if self.missing.contains(locator.value()) {
            return Err(BrowserError::NoSuchElement(locator.to_string()));
        }
        if let Some(left) = self.state.lock().unwrap().late.get_mut(locator.value()) {
            if *left > 0 {
                *left -= 1;
                return Err(BrowserError::NoSuchElement(locator.to_string()));
            }
        }
        Ok(ElementRef(locator.value().to_string()))
    }

    async fn type_text(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        text: &str,
    ) -> Result<(), BrowserError> {
        self.check_open(session)?;
        let mut state = self.state.lock().unwrap();
        state.log.typed.push((element.0.clone(), text.to_string()));
        Ok(())
    }

    async fn choose_option(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        option: &str,
    ) -> Result<(), BrowserError> {
        self.check_open(session)?;
        let mut state = self.state.lock().unwrap();
        state.log.chosen.push((element.0.clone(), option.to_string()));
        Ok(())
    }

    async fn set_checked(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        checked: bool,
    ) -> Result<(), BrowserError> {
        self.check_open(session)?;
        let mut state = self.state.lock().unwrap();
        state.log.checked.push((element.0.clone(), checked));
        Ok(())
    }

    async fn attach_file(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
        path: &Path,
    ) -> Result<(), BrowserError> {
        self.check_open(session)?;
        let mut state = self.state.lock().unwrap();
        state.log.attached.push((element.0.clone(), path.to_path_buf()));
        Ok(())
    }

    async fn click(
        &self,
        session: &SessionHandle,
        element: &ElementRef,
    ) -> Result<(), BrowserError> {
        self.check_open(session)?;
        if !element.0.contains("submit") {
            return Ok(());
        }
        self.state.lock().unwrap().log.submit_clicks += 1;
        if self.hang_on_submit {
            std::future::pending::<()>().await;
        }
        self.state.lock().unwrap().submitted = true;
        Ok(())
    }

    async fn close(&self, session: &SessionHandle) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if !state.log.closed.contains(&session.0) {
            state.log.closed.push(session.0.clone());
        }
        Ok(())
    }
}
