pub mod config;
pub mod dry_run;
pub mod error;
pub mod labels;
pub mod matcher;
pub mod naming;
pub mod output;
pub mod platform;
pub mod repos;
pub mod workflow;
pub mod workspace;
