pub mod client;
pub mod http_client;
pub mod store;

pub use client::{ClientError, TestrunClient};
pub use http_client::HttpTestrunClient;
