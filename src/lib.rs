// Library exports for Folio
// The binary and the integration tests both build on these modules

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod follow;
pub mod forms;
pub mod media;
pub mod routes;
pub mod state;
