//! Folio: a blog over an external document store with a tag-invalidated
//! query cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
