//! `mailtrail` — question answering over email archives.
//!
//! This crate parses plain-text emails and multi-message thread exports,
//! reorders quote trails, stores the messages as embedded documents, and
//! answers questions from the most relevant ones. An evaluation harness
//! scores answers against expected ones.

pub mod backend;
pub mod config;
pub mod error;
pub mod eval;
pub mod index;
pub mod model;
pub mod parser;
pub mod query;
pub mod session;
pub mod store;
