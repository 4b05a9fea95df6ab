//! Request-handling pipelines for the object and directory HTTP surface.

pub mod delete;
pub mod get;
pub mod headers;
pub mod lookup;
pub mod put;
