pub mod app;
pub mod consumer;
pub mod core;
