//! Authentication for the marketplace HTTP API.
//!
//! - [`middleware`]: session extractors and role guards
//! - [`handlers`]: signup, magic-link login, logout and profile endpoints

pub mod handlers;
pub mod middleware;

pub use middleware::{CurrentUser, OptionalUser, RequireAdmin, RequireGuardian, RequireTeacher};
