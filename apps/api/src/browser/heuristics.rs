//! Page-content heuristics. Matching is case-insensitive substring search over the
//! page source, so markers must be specific enough not to appear on ordinary forms.

const CHALLENGE_MARKERS: &[&str] = &[
    "verify you are human",
    "are you a robot",
    "unusual traffic",
    "checking your browser",
    "cf-challenge",
    "challenge-form",
    "px-captcha",
    "too many requests",
    "rate limit exceeded",
];

const FORM_GONE_MARKERS: &[&str] = &[
    "no longer accepting applications",
    "job is no longer available",
    "this job has expired",
    "position has been filled",
    "posting has been removed",
    "page not found",
];

const AUTH_MARKERS: &[&str] = &[
    "sign in to apply",
    "log in to apply",
    "please sign in",
    "please log in",
    "login required",
    "create an account to apply",
];

const CONFIRMATION_MARKERS: &[&str] = &[
    "application submitted",
    "application has been submitted",
    "thank you for applying",
    "thanks for applying",
    "application received",
    "we have received your application",
    "we've received your application",
];

/// What a loaded page looks like from the driver's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCheck {
    Usable,
    /// Anti-bot interstitial or rate limiting. Transient.
    Challenge(&'static str),
    FormGone(&'static str),
    AuthRequired(&'static str),
}

/// Challenge wins over the other markers: a challenge page often hides the real content.
pub fn inspect(page_source: &str) -> PageCheck {
    let page = page_source.to_lowercase();
    if let Some(marker) = first_marker(&page, CHALLENGE_MARKERS) {
        return PageCheck::Challenge(marker);
    }
    if let Some(marker) = first_marker(&page, FORM_GONE_MARKERS) {
        return PageCheck::FormGone(marker);
    }
    if let Some(marker) = first_marker(&page, AUTH_MARKERS) {
        return PageCheck::AuthRequired(marker);
    }
    PageCheck::Usable
}

pub fn looks_confirmed(page_source: &str) -> bool {
    let page = page_source.to_lowercase();
    first_marker(&page, CONFIRMATION_MARKERS).is_some()
}

fn first_marker(page: &str, markers: &[&'static str]) -> Option<&'static str> {
    markers.iter().copied().find(|m| page.contains(m))
}
