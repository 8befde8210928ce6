/// Canonical profile key with the label phrases that mean it.
#[derive(Debug, Clone, Copy)]
pub struct SynonymEntry {
    pub key: &'static str,
    pub phrases: &'static [&'static str],
}

/// Label → key synonym table. Order is significant: on equal scores the earlier entry wins.
pub const SYNONYMS: &[SynonymEntry] = &[
    SynonymEntry {
        key: "full_name",
        phrases: &["name", "full name", "legal name", "applicant name", "candidate name"],
    },
    SynonymEntry {
        key: "first_name",
        phrases: &["first name", "given name", "forename"],
    },
    SynonymEntry {
        key: "last_name",
        phrases: &["last name", "surname", "family name"],
    },
    SynonymEntry {
        key: "email",
        phrases: &["email", "email address", "e mail", "e mail address", "contact email"],
    },
    SynonymEntry {
        key: "phone",
        phrases: &["phone", "phone number", "mobile", "mobile number", "telephone", "cell phone"],
    },
    SynonymEntry {
        key: "location",
        phrases: &["location", "city", "current location", "current city"],
    },
    SynonymEntry {
        key: "linkedin_url",
        phrases: &["linkedin", "linkedin profile", "linkedin url"],
    },
    SynonymEntry {
        key: "github_url",
        phrases: &["github", "github profile", "github url"],
    },
    SynonymEntry {
        key: "website_url",
        phrases: &["website", "portfolio", "personal website", "portfolio url"],
    },
    SynonymEntry {
        key: "years_experience",
        phrases: &[
            "years experience",
            "years of experience",
            "years of relevant experience",
            "total experience",
        ],
    },
    SynonymEntry {
        key: "work_authorization",
        phrases: &[
            "work authorization",
            "authorized to work",
            "legally authorized to work",
            "eligible to work",
        ],
    },
    SynonymEntry {
        key: "sponsorship",
        phrases: &["sponsorship", "visa sponsorship", "require sponsorship"],
    },
    SynonymEntry {
        key: "salary_expectation",
        phrases: &[
            "salary expectation",
            "expected salary",
            "desired salary",
            "compensation expectations",
        ],
    },
    SynonymEntry {
        key: "start_date",
        phrases: &["start date", "earliest start date", "notice period", "availability"],
    },
    SynonymEntry {
        key: "relocation",
        phrases: &["relocation", "willing to relocate", "open to relocation"],
    },
    SynonymEntry {
        key: "cover_letter",
        phrases: &["cover letter", "motivation letter"],
    },
];
