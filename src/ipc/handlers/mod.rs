pub mod admin;
pub mod auth;
pub mod backup_exchange;
pub mod core;
pub mod student;
pub mod teacher;
