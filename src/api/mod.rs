pub mod clearance;
pub mod health;
pub mod notification;
