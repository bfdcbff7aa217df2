// src/services/mod.rs

//! Domain logic shared by handlers. Every function takes its store
//! explicitly so tests can swap in the in-memory one.

pub mod certificates;
pub mod course_form;
pub mod progress;
pub mod scoring;
pub mod users;
