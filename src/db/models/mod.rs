pub mod catalog;
pub mod clearance;
pub mod notification;
