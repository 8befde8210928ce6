use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Contact details and links. Every value is optional because profiles are
/// filled in incrementally by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub website_url: Option<String>,
}

/// Read-only snapshot of a decrypted profile, resolved once per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub profile_id: String,
    #[serde(default)]
    pub personal_info: PersonalInfo,
    /// Label (e.g. "resume", "cover letter") to a local file path.
    #[serde(default)]
    pub resume_files: BTreeMap<String, PathBuf>,
    /// Normalized question key (e.g. `years_experience`) to canonical answer.
    #[serde(default)]
    pub structured_answers: BTreeMap<String, String>,
}

impl Profile {
    /// Looks up a canonical answer for a key. Personal info keys take precedence
    /// over structured answers so contact details have a single source.
    pub fn answer_for(&self, key: &str) -> Option<&str> {
        let info = &self.personal_info;
        let personal = match key {
            "full_name" => info.full_name.as_deref(),
            "first_name" => None,
            "last_name" => None,
            "email" => info.email.as_deref(),
            "phone" => info.phone.as_deref(),
            "location" => info.location.as_deref(),
            "linkedin_url" => info.linkedin_url.as_deref(),
            "github_url" => info.github_url.as_deref(),
            "website_url" => info.website_url.as_deref(),
            _ => None,
        };
        if let Some(value) = personal.filter(|v| !v.trim().is_empty()) {
            return Some(value);
        }

        let name_parts: Vec<&str> = info
            .full_name
            .as_deref()
            .map(|n| n.split_whitespace().collect())
            .unwrap_or_default();
        let derived = match key {
            "first_name" => name_parts.first().copied(),
            "last_name" if name_parts.len() > 1 => name_parts.last().copied(),
            _ => None,
        };
        if derived.is_some() {
            return derived;
        }

        self.structured_answers
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Short plain-text rendering used as generator context.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(name) = &self.personal_info.full_name {
            lines.push(format!("name: {name}"));
        }
        if let Some(location) = &self.personal_info.location {
            lines.push(format!("location: {location}"));
        }
        for (key, value) in &self.structured_answers {
            lines.push(format!("{}: {}", key.replace('_', " "), value));
        }
        lines
    }
}
