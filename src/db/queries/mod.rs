pub mod clearance;
pub mod notification;
