pub mod cache;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod fetch;
pub mod matching;
pub mod merge;
pub mod models;
pub mod output;
pub mod parsing;
pub mod pipeline;
