//! services/api/src/lib.rs
//!
//! The MINDI API service: adapters for the outside world, session tokens,
//! the weekly report workflow and the axum web layer.

pub mod adapters;
pub mod auth;
pub mod config;
pub mod error;
pub mod report;
pub mod web;
