pub mod analysis;
pub mod prompts;
pub mod search;
