// src/lib.rs
// Order, response and deal lifecycle library

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod adapter;
pub mod config;
