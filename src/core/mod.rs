// Core modules: token codec, handle registry, engine contract, and engines.
#[cfg(feature = "libaugeas")]
pub mod augeas;
pub mod engine;
pub mod error;
pub mod memory;
pub mod registry;
pub mod token;
