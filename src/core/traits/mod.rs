pub mod fetcher;
pub mod provider;
