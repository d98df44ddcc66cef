//! NoteHub Server - Token-authenticated notes API.
//!
//! This crate provides a small notes service built around two pieces of
//! machinery that every request passes through:
//!
//! - a typed error taxonomy with stable codes, propagated from any point
//!   in request handling to one terminal dispatcher that renders a
//!   deterministic wire response;
//! - a stateless token-authentication gate that hashes and verifies
//!   credentials, issues signed time-bounded tokens, and validates them
//!   before any protected handler runs.
//!
//! Everything else - routing, persistence - is a collaborator behind an
//! interface.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod password;
pub mod routes;
pub mod store;
pub mod token;
pub mod types;
