pub mod app;
pub mod archive;
pub mod config;
pub mod domain;
pub mod error;
pub mod installer;
pub mod layout;
pub mod output;
pub mod probe;
pub mod registry;
pub mod runner;
pub mod runtime;
pub mod version;
