//! Topic-model training studio for app reviews.
//!
//! Admits, runs, tracks and cancels background LDA training jobs, one per
//! app, and serves the resulting topic charts over HTTP.

pub mod catalog;
pub mod charts;
pub mod config;
pub mod errors;
pub mod layout;
pub mod logging;
pub mod nlp;
pub mod studio_config;
pub mod training;
pub mod web;
