// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod books;
pub mod certificates;
pub mod courses;
pub mod files;
pub mod messages;
pub mod quiz;
pub mod uploads;
pub mod users;
