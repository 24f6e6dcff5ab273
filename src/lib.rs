pub mod api;
pub mod attributes;
pub mod config;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod logger;
pub mod models;
pub mod prompt;
pub mod rag;
pub mod session;

#[cfg(test)]
mod testing;
