// Application State Machine and the posting/profile boundaries it reads from.

pub mod catalog;
pub mod state_machine;

pub use catalog::{Catalog, CatalogError, PostingProvider, ProfileProvider};
pub use state_machine::{ApplicationEngine, EngineError, EngineSettings};
