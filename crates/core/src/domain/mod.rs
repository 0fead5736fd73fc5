pub mod analysis;
pub mod signal;
