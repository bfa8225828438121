pub mod cache;
pub mod daemon;
pub mod fetch;
pub mod setup;
pub mod status;
pub mod sync;
pub mod ui;
