//! Purpose: Contract for the external configuration-tree engine.
//! Exports: `Engine`, `Session`, `InitFlags`, `RawSpan`.
//! Role: Seam between the dispatcher and a concrete engine (memory or libaugeas).
//! Invariants: Session methods speak the engine's raw return-code convention;
//! Invariants: mapping codes to outcomes belongs to the dispatcher, not here.
//! Invariants: `Session::close` consumes the handle, so it runs at most once.
use std::fmt;
use std::ops::BitOr;

/// Opaque bitmask handed to `Engine::init`.
///
/// Bit meanings belong to the engine; the constants mirror libaugeas so that
/// callers do not have to hard-code numbers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InitFlags(u32);

impl InitFlags {
    pub const NONE: InitFlags = InitFlags(0);
    pub const SAVE_BACKUP: InitFlags = InitFlags(1 << 0);
    pub const SAVE_NEWFILE: InitFlags = InitFlags(1 << 1);
    pub const TYPE_CHECK: InitFlags = InitFlags(1 << 2);
    pub const NO_STDINC: InitFlags = InitFlags(1 << 3);
    pub const SAVE_NOOP: InitFlags = InitFlags(1 << 4);
    pub const NO_LOAD: InitFlags = InitFlags(1 << 5);
    pub const NO_MODL_AUTOLOAD: InitFlags = InitFlags(1 << 6);
    pub const ENABLE_SPAN: InitFlags = InitFlags(1 << 7);
    pub const NO_ERR_CLOSE: InitFlags = InitFlags(1 << 8);
    pub const TRACE_MODULE_LOADING: InitFlags = InitFlags(1 << 9);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: InitFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for InitFlags {
    type Output = InitFlags;

    fn bitor(self, rhs: InitFlags) -> InitFlags {
        InitFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for InitFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// File position data for one node, as the engine reports it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawSpan {
    pub filename: String,
    pub label_start: u32,
    pub label_end: u32,
    pub value_start: u32,
    pub value_end: u32,
    pub span_start: u32,
    pub span_end: u32,
}

pub trait Engine {
    type Session: Session;

    /// Build a new session; `None` when the engine refuses root/loadpath/flags.
    fn init(&mut self, root: &str, loadpath: Option<&str>, flags: InitFlags)
    -> Option<Self::Session>;
}

/// One live engine handle.
///
/// Return codes follow the engine's C convention:
/// - `save`/`load`: `0` success, negative failure.
/// - `get`: `1` exactly one match, `0` none, negative for several or an invalid path.
/// - `set`: `0` success, `-1` several matches or invalid path, anything else unknown.
/// - `setm`: positive count, `0` no match, `-1` failure.
/// - `insert`: `0` success, anything else failure.
/// - `mv`: `0` success, `-1` failure.
/// - `rm`/`rename`: positive count, `0` no match, negative invalid path.
/// - `matches`: non-negative count, negative invalid path.
/// - `span`: `0` success, negative when no position data exists.
///
/// `get` and `set` report several matches and a malformed path with the same
/// code; `error_message` is what tells them apart, and hosts surface it as the
/// error detail.
pub trait Session {
    fn close(self);
    fn save(&mut self) -> i32;
    fn load(&mut self) -> i32;
    fn get(&self, path: &str) -> (i32, Option<String>);
    fn set(&mut self, path: &str, value: Option<&str>) -> i32;
    fn setm(&mut self, base: &str, sub: Option<&str>, value: &str) -> i32;
    fn insert(&mut self, path: &str, label: &str, before: bool) -> i32;
    fn mv(&mut self, src: &str, dst: &str) -> i32;
    fn rm(&mut self, path: &str) -> i32;
    fn rename(&mut self, src: &str, label: &str) -> i32;
    fn matches(&self, path: &str) -> (i32, Vec<String>);
    fn span(&self, path: &str) -> (i32, Option<RawSpan>);

    /// Engine description of the most recent failure, if it keeps one.
    fn error_message(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::InitFlags;

    #[test]
    fn flags_combine_and_test() {
        let flags = InitFlags::NO_LOAD | InitFlags::ENABLE_SPAN;
        assert_eq!(flags.bits(), 32 | 128);
        assert!(flags.contains(InitFlags::NO_LOAD));
        assert!(!flags.contains(InitFlags::SAVE_BACKUP));
        assert_eq!(InitFlags::from_bits(flags.bits()), flags);
        assert_eq!(flags.to_string(), "0xa0");
    }
}
