// Answer Resolver: generator seam, option constraint and answer formatting.

pub mod generator;
pub mod prompts;
pub mod resolver;
#[cfg(test)]
pub mod scripted;
pub mod truncate;

pub use generator::{AnswerGenerator, AnswerRequest, GeneratedAnswer, GeneratorError, LlmAnswerGenerator};
pub use resolver::{AnswerResolver, ResolverSettings};
