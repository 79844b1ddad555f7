//! Authentication primitives.
//!
//! Sessions are issued elsewhere; this service only verifies the HS256
//! access tokens it is handed.

pub mod jwt;
