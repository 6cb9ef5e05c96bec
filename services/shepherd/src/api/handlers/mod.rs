//! API handlers for the identity service.
//!
//! `auth` carries the public registration/login/recovery surface and the
//! authenticated session endpoints; `users` is the administrative surface;
//! `health` and `root` are operational.

pub mod auth;
pub mod health;
pub mod root;
pub mod users;
