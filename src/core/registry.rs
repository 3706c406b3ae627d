//! Purpose: Own every live engine handle of one host session, keyed by token.
//! Exports: `Registry`.
//! Role: Token issuance, O(1) lookup, removal on close, and bulk teardown.
//! Invariants: Tokens come from a monotonic counter and are never reissued.
//! Invariants: Once removed (take or teardown), a token never resolves again.
//! Invariants: Teardown closes each remaining handle exactly once.
use std::collections::HashMap;

use crate::core::engine::Session;
use crate::core::error::{Error, ErrorKind};
use crate::core::token::Token;

#[derive(Debug)]
pub struct Registry<S> {
    entries: HashMap<Token, S>,
    last_issued: u64,
}

impl<S> Registry<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            last_issued: 0,
        }
    }

    /// Insert `handle` under a fresh token.
    ///
    /// Fails only when the counter is exhausted; the handle is handed back so
    /// the caller can release it.
    pub fn create(&mut self, handle: S) -> Result<Token, (Error, S)> {
        let Some(token) = self.last_issued.checked_add(1).and_then(Token::new) else {
            let err = Error::new(ErrorKind::Internal).with_message("token counter exhausted");
            return Err((err, handle));
        };
        self.last_issued = token.get();
        self.entries.insert(token, handle);
        tracing::debug!(token = token.get(), live = self.entries.len(), "registered handle");
        Ok(token)
    }

    pub fn lookup(&self, token: Token) -> Option<&S> {
        self.entries.get(&token)
    }

    pub fn lookup_mut(&mut self, token: Token) -> Option<&mut S> {
        self.entries.get_mut(&token)
    }

    /// Remove and return the handle for `token`.
    pub fn take(&mut self, token: Token) -> Option<S> {
        let handle = self.entries.remove(&token);
        if handle.is_some() {
            tracing::debug!(token = token.get(), live = self.entries.len(), "released handle");
        }
        handle
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live tokens in issue order.
    pub fn tokens(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.entries.keys().copied().collect();
        tokens.sort_unstable();
        tokens
    }

    /// Highest counter value issued so far (0 before the first `create`).
    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }
}

impl<S: Session> Registry<S> {
    /// Close every remaining handle and empty the registry.
    ///
    /// Returns how many handles were closed. The counter is kept, so tokens
    /// issued before teardown stay dead.
    pub fn teardown(&mut self) -> usize {
        let mut drained: Vec<(Token, S)> = self.entries.drain().collect();
        drained.sort_unstable_by_key(|(token, _)| *token);
        let count = drained.len();
        for (token, handle) in drained {
            tracing::debug!(token = token.get(), "closing handle at teardown");
            handle.close();
        }
        count
    }
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}
