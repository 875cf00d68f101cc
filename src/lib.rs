pub mod api;
pub mod backtest;
pub mod dashboard;
pub mod feed;
pub mod logging;
pub mod render;
pub mod state;
