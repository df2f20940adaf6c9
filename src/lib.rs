// Library surface for the binary, headless integration tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod dictionary;
pub mod elapsed;
pub mod error;
pub mod export;
pub mod history;
pub mod item;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod ui;
pub mod util;

pub use error::{Error, Result};
