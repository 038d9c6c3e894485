//! Clearance workflow: lifecycle rules, derived views and the request service.

pub mod catalog;
pub mod filters;
pub mod lifecycle;
pub mod service;
