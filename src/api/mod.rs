//! Purpose: Define the public Rust API for hosting engine sessions.
//! Exports: Session, command, outcome, and error types needed by the CLI and C ABI.
//! Role: Public, additive-only surface; hides dispatch internals.
//! Invariants: Hosts reach the registry only through `HostSession`.
mod command;
mod dispatch;
mod envelope;
mod outcome;
mod session;

pub use crate::core::engine::{Engine, InitFlags, RawSpan, Session};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{EngineFault, Error, ErrorKind};
pub use crate::core::memory::MemoryEngine;
pub use crate::core::token::{DEFAULT_NAMESPACE, Token, TokenCodec};
pub use command::{COMMANDS, Command, CommandShape, InsertPosition, usage};
pub use envelope::{error_value, result_value};
pub use outcome::{Offsets, Outcome, SpanInfo};
pub use session::{HostSession, SessionConfig};

#[cfg(feature = "libaugeas")]
pub use crate::core::augeas::LibAugeas;

/// Engine used by the binary and the C ABI when none is chosen explicitly.
#[cfg(feature = "libaugeas")]
pub type DefaultEngine = crate::core::augeas::LibAugeas;
#[cfg(not(feature = "libaugeas"))]
pub type DefaultEngine = crate::core::memory::MemoryEngine;
