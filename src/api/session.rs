//! Purpose: The host-owned session: one registry, one engine, one token namespace.
//! Exports: `HostSession`, `SessionConfig`.
//! Role: Lifecycle boundary; construction starts a session, shutdown or drop ends it.
//! Invariants: Teardown runs at most once and closes every live handle exactly once.
//! Invariants: Commands after shutdown are impossible (`shutdown` consumes the session).
use crate::api::command::Command;
use crate::api::dispatch::dispatch;
use crate::api::outcome::Outcome;
use crate::core::engine::Engine;
use crate::core::error::{Error, ErrorKind};
use crate::core::registry::Registry;
use crate::core::token::{DEFAULT_NAMESPACE, TokenCodec};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionConfig {
    pub namespace: String,
}

impl SessionConfig {
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }
}

pub struct HostSession<E: Engine> {
    engine: E,
    codec: TokenCodec,
    registry: Registry<E::Session>,
    torn_down: bool,
}

impl<E: Engine> HostSession<E> {
    pub fn new(engine: E, config: SessionConfig) -> Result<Self, Error> {
        let codec = TokenCodec::new(config.namespace)?;
        tracing::info!(namespace = codec.namespace(), "session started");
        Ok(Self {
            engine,
            codec,
            registry: Registry::new(),
            torn_down: false,
        })
    }

    /// Parse and run an argv-style command; `name` is the command word.
    pub fn invoke<S: AsRef<str>>(&mut self, name: &str, args: &[S]) -> Result<Outcome, Error> {
        let command = Command::parse(name, args)?;
        self.execute(command)
    }

    /// Like `invoke`, with the command word as the first element of `argv`.
    pub fn invoke_argv<S: AsRef<str>>(&mut self, argv: &[S]) -> Result<Outcome, Error> {
        match argv.split_first() {
            Some((name, args)) => self.invoke(name.as_ref(), args),
            None => Err(Error::new(ErrorKind::Usage)
                .with_message("missing command name")),
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<Outcome, Error> {
        tracing::debug!(command = command.name(), "dispatching");
        dispatch(&mut self.engine, &self.codec, &mut self.registry, command)
    }

    /// Live tokens, in issue order, in external form.
    pub fn handles(&self) -> Vec<String> {
        self.registry
            .tokens()
            .into_iter()
            .map(|token| self.codec.encode(token))
            .collect()
    }

    pub fn live(&self) -> usize {
        self.registry.len()
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// End the session now; returns how many handles were still open.
    pub fn shutdown(mut self) -> usize {
        self.teardown()
    }

    fn teardown(&mut self) -> usize {
        if self.torn_down {
            return 0;
        }
        self.torn_down = true;
        let closed = self.registry.teardown();
        tracing::info!(closed, issued = self.registry.last_issued(), "session ended");
        closed
    }
}

impl<E: Engine> Drop for HostSession<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}
