// HTTP handlers for postings, profiles and application attempts.

pub mod handlers;
