//! View models and user-facing flows on top of the blog API.

pub mod notify;
pub mod submit;
pub mod views;
