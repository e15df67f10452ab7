pub mod api;
pub mod config;
pub mod engine;
pub mod field;
pub mod identity;
pub mod league;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reconciler;
pub mod time;
pub mod wal;
