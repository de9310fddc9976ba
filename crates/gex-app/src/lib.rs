//! Real-time gamma exposure console.
//!
//! Main application that wires the components together:
//! - Resilient option-chain stream for one ticker
//! - Latest-quote book and per-batch re-aggregation
//! - Top-strike console report
//! - Optional JSON Lines snapshot recording

pub mod app;
pub mod book;
pub mod config;
pub mod error;
pub mod render;

pub use app::Application;
pub use book::ChainBook;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use render::{format_gex, render_report};
