//! Mouth Metrics - Public professional profile pages
//!
//! Server-rendered account pages, a profile editor backed by the remote
//! users API, and public profile pages with search metadata.

pub mod api;
pub mod cache;
pub mod config;
pub mod identity;
pub mod models;
pub mod services;
pub mod users_api;
pub mod views;
