pub mod config;
pub mod content;
pub mod documents;
pub mod domain;
pub mod engine;
pub mod export;
pub mod package;
pub mod pipeline;
pub mod roster;
