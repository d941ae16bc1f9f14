// Library root: application state, search and scan flows, and the CLI
// surface, exposed so integration tests can drive them directly.

pub mod app;
pub mod cli;
pub mod scan;
pub mod search;
