pub mod config;
pub mod extraction;
pub mod image;
pub mod pricing;
pub mod prompts;
pub mod providers;
pub mod rate_limit;
