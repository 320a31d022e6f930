//! Aggregation and segmentation engine for wellbeing questionnaire analytics.
//!
//! Records are loaded wholesale from a key-value store ([`store`]), classified
//! into issues ([`issues`]), merged with visit-time demographics
//! ([`demographics`]) and tallied ([`aggregate`]). Rankings, timing difficulty
//! and the visit funnel are derived from those tallies ([`ranking`],
//! [`funnel`]).

pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod demographics;
pub mod error;
pub mod funnel;
pub mod issues;
pub mod models;
pub mod ranking;
pub mod report;
pub mod seed;
pub mod store;

pub use error::{AnalyticsError, Result};
