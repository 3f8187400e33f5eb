//! daily-reminder-bot - Daily weather reminders and hazard warnings for chat subscribers.
//!
//! This crate provides:
//! - Minute-aligned daily reminders with AI-written or templated content
//! - Weather hazard monitoring with per-alert deduplication
//! - Subscription and todo management backed by SQLite

pub mod calendar;
pub mod completion;
pub mod config;
pub mod delivery;
pub mod entity;
pub mod error;
pub mod logging;
pub mod repository;
pub mod service;
pub mod task;
pub mod weather;
