pub mod client;
pub mod mock_client;
pub mod prompts;

pub use client::*;
pub use mock_client::*;
pub use prompts::*;
