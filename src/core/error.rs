//! Purpose: Structured error model shared by the registry, dispatcher, CLI, and C ABI.
//! Exports: `Error`, `ErrorKind`, `EngineFault`, `to_exit_code`.
//! Role: Single failure type; every command failure surfaces as one of these.
//! Invariants: Kinds are `Copy` and compare by value; numeric codes are stable.
//! Invariants: Engine failures keep the engine's own message as `detail`.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Token,
    Conversion,
    Construction,
    Engine(EngineFault),
    Io,
}

/// Distinct failure classes reported through the engine's return codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineFault {
    NoMatch,
    Ambiguous,
    InvalidPath,
    SetFailed,
    InsertFailed,
    MoveFailed,
    SaveFailed,
    LoadFailed,
    NoSpan,
    Unknown,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    detail: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            detail: None,
            source: None,
        }
    }

    pub fn engine(fault: EngineFault) -> Self {
        Self::new(ErrorKind::Engine(fault))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Short, stable label for the kind (used in JSON envelopes).
    pub fn kind_label(&self) -> &'static str {
        kind_label(self.kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind_label())?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Internal => "internal",
        ErrorKind::Usage => "usage",
        ErrorKind::Token => "token",
        ErrorKind::Conversion => "conversion",
        ErrorKind::Construction => "construction",
        ErrorKind::Io => "io",
        ErrorKind::Engine(fault) => match fault {
            EngineFault::NoMatch => "engine.no_match",
            EngineFault::Ambiguous => "engine.ambiguous",
            EngineFault::InvalidPath => "engine.invalid_path",
            EngineFault::SetFailed => "engine.set_failed",
            EngineFault::InsertFailed => "engine.insert_failed",
            EngineFault::MoveFailed => "engine.move_failed",
            EngineFault::SaveFailed => "engine.save_failed",
            EngineFault::LoadFailed => "engine.load_failed",
            EngineFault::NoSpan => "engine.no_span",
            EngineFault::Unknown => "engine.unknown",
        },
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Token => 3,
        ErrorKind::Conversion => 4,
        ErrorKind::Construction => 5,
        ErrorKind::Engine(_) => 6,
        ErrorKind::Io => 7,
    }
}
