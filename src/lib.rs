pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod history;
pub mod lesion;

pub use app::App;
