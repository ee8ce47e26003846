//! CLI command implementations.

pub mod filter;
pub mod inspect;
pub mod layers;
pub mod stream;
