pub mod clear;
pub mod config;
pub mod report;
pub mod watch;
