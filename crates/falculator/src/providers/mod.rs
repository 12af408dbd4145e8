pub mod api_client;
pub mod base;
pub mod errors;
pub mod factory;
pub mod formats;
pub mod google;
pub mod openrouter;
pub mod utils;

pub use base::{ProviderKind, ProviderMetadata, VisionProvider};
pub use errors::ProviderError;
pub use factory::{providers, HttpProviderFactory, ProviderFactory};
