// Field Mapper: label normalization, synonym table and fuzzy scoring.

pub mod fuzzy;
pub mod mapper;
pub mod normalize;
pub mod synonyms;

pub use mapper::{FieldMapper, DEFAULT_MATCH_THRESHOLD};
