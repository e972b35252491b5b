// HTTP request router
pub mod api;

// Capability implementations behind the research-capability executable
pub mod capability;

// Client orchestrator
pub mod client;

// Server configuration
pub mod config;

// SQLite project database
pub mod database;

// Capability executable discovery
pub mod discovery;

pub mod error;

// Generation invoker
pub mod generation;

// In-process store adapter
pub mod local;

// Research generation pipeline
pub mod research;

// Capability runtime module
pub mod runtime;

// Static file server
pub mod static_files;

// Project store gateway
pub mod store;
