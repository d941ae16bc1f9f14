// Core types shared by the API client and the application layer: the wire
// data model, configuration, the local key-value store, and the UI-level
// state containers (theme, language, alerts, role-based screen access).

pub mod access;
pub mod alert;
pub mod config;
pub mod model;
pub mod prefs;
pub mod storage;
