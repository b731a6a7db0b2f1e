//! imgprssr end-to-end verification harness
//!
//! Requests resized and cropped variants of a source image from a running
//! imgprssr service, checks the returned pixel dimensions against what was
//! asked for, and compares each response with an accepted baseline.

pub mod cli;
pub mod config;
pub mod models;
pub mod services;
