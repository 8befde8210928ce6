use serde::{Deserialize, Serialize};

/// Where a posting was discovered. Used to key the per-source session limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    #[serde(rename = "linkedin")]
    LinkedIn,
    Indeed,
    Other,
}

impl JobSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobSource::LinkedIn => "linkedin",
            JobSource::Indeed => "indeed",
            JobSource::Other => "other",
        }
    }
}

/// Capability tag of one form control. Every `match` on this enum is exhaustive
/// so a new kind has to be handled by the mapper, resolver and driver alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    ShortText,
    LongText,
    Select,
    File,
    Checkbox,
    Radio,
}

impl FieldKind {
    pub fn has_options(&self) -> bool {
        matches!(self, FieldKind::Select | FieldKind::Radio)
    }
}

/// One control on the live form, re-derived per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFieldDescriptor {
    /// Locator hint, optionally prefixed with a strategy (`css=`, `xpath=`, `id=`, `name=`).
    pub selector_hint: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Normalized posting handed over by the job source. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: String,
    pub url: String,
    pub title: String,
    pub company: String,
    pub source: JobSource,
    #[serde(default)]
    pub form_fields: Vec<FormFieldDescriptor>,
}

impl JobPosting {
    pub fn headline(&self) -> String {
        format!("{} at {}", self.title, self.company)
    }
}
