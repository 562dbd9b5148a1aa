//! Data models
//!
//! This module contains the data structures used throughout Mouth Metrics:
//! - User records exchanged with the remote users API
//! - Server-side sessions
//! - Reference option lists for the profile editor

pub mod reference;
mod session;
mod user;

pub use reference::RefOption;
pub use session::Session;
pub use user::{normalize_list, split_list, NewUser, ProfileUpdate, UserRecord};
