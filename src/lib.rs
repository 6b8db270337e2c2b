pub mod analyzer;
pub mod app;
pub mod backends;
pub mod cli;
pub mod commands;
pub mod completion;
pub mod composer;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod project_context;
pub mod provider;
pub mod render;
pub mod state;
pub mod tasks;
pub mod telemetry;
pub mod theme;
