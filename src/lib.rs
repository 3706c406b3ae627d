//! Purpose: Library crate bridging a configuration-tree engine to scripting hosts.
//! Exports: `api` (host session, commands, outcomes), `core` (registry, tokens, engines), `abi`.
//! Role: Backs the `augbridge` CLI and the C ABI; hosts embed `api::HostSession`.
//! Invariants: Handles are reachable only through tokens issued by one session's registry.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod abi;
pub mod api;
pub mod core;
