//! Core data model: parsed email records, thread segments, and stored documents.

pub mod address;
pub mod document;
pub mod record;
pub mod segment;
