pub mod anthropic_client;
pub mod suno_client;

pub use anthropic_client::*;
pub use suno_client::*;
