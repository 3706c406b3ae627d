//! Purpose: Run one typed command against the registry and the engine.
//! Exports: `dispatch`.
//! Role: Token resolution, engine invocation, and return-code mapping.
//! Invariants: Tokens resolve before the engine is touched; failures never mutate the registry.
//! Invariants: A failed `init` issues no token; a successful `close` removes its token first.
//! Invariants: Every distinct engine return class maps to a distinct `Outcome` or `EngineFault`.
use crate::api::command::{Command, InsertPosition};
use crate::api::outcome::{Outcome, SpanInfo};
use crate::core::engine::{Engine, Session};
use crate::core::error::{EngineFault, Error, ErrorKind};
use crate::core::registry::Registry;
use crate::core::token::TokenCodec;

pub fn dispatch<E: Engine>(
    engine: &mut E,
    codec: &TokenCodec,
    registry: &mut Registry<E::Session>,
    command: Command,
) -> Result<Outcome, Error> {
    let op = command.name();
    match command {
        Command::Init {
            root,
            loadpath,
            flags,
        } => {
            let Some(session) = engine.init(&root, loadpath.as_deref(), flags) else {
                tracing::warn!(root = %root, flags = %flags, "engine refused to initialize");
                return Err(Error::new(ErrorKind::Construction)
                    .with_message("cannot initialize augeas")
                    .with_detail(root));
            };
            match registry.create(session) {
                Ok(token) => Ok(Outcome::Token(codec.encode(token))),
                Err((err, session)) => {
                    session.close();
                    Err(err)
                }
            }
        }
        Command::Close { token: raw } => {
            let token = codec.decode(&raw)?;
            let session = registry.take(token).ok_or_else(|| unknown_token(&raw))?;
            session.close();
            Ok(Outcome::Done)
        }
        Command::Save { token } => {
            let session = session_mut(codec, registry, &token)?;
            match session.save() {
                code if code < 0 => Err(fail(
                    session,
                    op,
                    EngineFault::SaveFailed,
                    "saving failed",
                    &token,
                )),
                _ => Ok(Outcome::Done),
            }
        }
        Command::Load { token } => {
            let session = session_mut(codec, registry, &token)?;
            match session.load() {
                code if code < 0 => Err(fail(
                    session,
                    op,
                    EngineFault::LoadFailed,
                    "loading failed",
                    &token,
                )),
                _ => Ok(Outcome::Done),
            }
        }
        Command::Get { token, path } => {
            let session = session_mut(codec, registry, &token)?;
            match session.get(&path) {
                (1, value) => Ok(Outcome::Value(value)),
                (0, _) => Err(fail(session, op, EngineFault::NoMatch, "node not found", &path)),
                (code, _) if code < 0 => Err(fail(
                    session,
                    op,
                    EngineFault::Ambiguous,
                    "path matches multiple nodes or is invalid",
                    &path,
                )),
                _ => Err(fail(session, op, EngineFault::Unknown, "unknown error", &path)),
            }
        }
        Command::Set { token, path, value } => {
            let session = session_mut(codec, registry, &token)?;
            match session.set(&path, Some(&value)) {
                0 => Ok(Outcome::Done),
                -1 => Err(fail(
                    session,
                    op,
                    EngineFault::Ambiguous,
                    "path matches multiple nodes or is invalid",
                    &path,
                )),
                _ => Err(fail(session, op, EngineFault::Unknown, "unknown error", &path)),
            }
        }
        Command::Setm {
            token,
            base,
            sub,
            value,
        } => {
            let session = session_mut(codec, registry, &token)?;
            match session.setm(&base, sub.as_deref(), &value) {
                code if code > 0 => Ok(Outcome::Count(count(code))),
                0 => Err(fail(
                    session,
                    op,
                    EngineFault::NoMatch,
                    "no nodes matched path",
                    &base,
                )),
                -1 => Err(fail(
                    session,
                    op,
                    EngineFault::SetFailed,
                    "could not set value",
                    &base,
                )),
                _ => Err(fail(session, op, EngineFault::Unknown, "unknown error", &base)),
            }
        }
        Command::Insert {
            token,
            path,
            label,
            position,
        } => {
            let session = session_mut(codec, registry, &token)?;
            let before = position == InsertPosition::Before;
            match session.insert(&path, &label, before) {
                0 => Ok(Outcome::Done),
                _ => Err(fail(session, op, EngineFault::InsertFailed, "insert failed", &path)),
            }
        }
        Command::Mv { token, src, dst } => {
            let session = session_mut(codec, registry, &token)?;
            match session.mv(&src, &dst) {
                0 => Ok(Outcome::Done),
                -1 => Err(fail(session, op, EngineFault::MoveFailed, "move failed", &src)),
                _ => Err(fail(session, op, EngineFault::Unknown, "unknown error", &src)),
            }
        }
        Command::Rm { token, path } => {
            let session = session_mut(codec, registry, &token)?;
            let code = session.rm(&path);
            counted(session, op, code, &path)
        }
        Command::Rename { token, src, label } => {
            let session = session_mut(codec, registry, &token)?;
            let code = session.rename(&src, &label);
            counted(session, op, code, &src)
        }
        Command::Match { token, path } => {
            let session = session_mut(codec, registry, &token)?;
            match session.matches(&path) {
                (code, _) if code < 0 => Err(fail(
                    session,
                    op,
                    EngineFault::InvalidPath,
                    "invalid path",
                    &path,
                )),
                (_, paths) => Ok(Outcome::Paths(paths)),
            }
        }
        Command::Span { token, path } => {
            let session = session_mut(codec, registry, &token)?;
            match session.span(&path) {
                (0, Some(span)) => Ok(Outcome::Span(SpanInfo::from(span))),
                (0, None) => Err(Error::new(ErrorKind::Internal)
                    .with_message("engine reported span without data")
                    .with_detail(path)),
                (code, _) if code < 0 => Err(fail(
                    session,
                    op,
                    EngineFault::NoSpan,
                    "no span info for path",
                    &path,
                )),
                _ => Err(fail(session, op, EngineFault::Unknown, "unknown error", &path)),
            }
        }
        Command::Handles => Ok(Outcome::Handles(
            registry
                .tokens()
                .into_iter()
                .map(|token| codec.encode(token))
                .collect(),
        )),
    }
}

fn session_mut<'a, S>(
    codec: &TokenCodec,
    registry: &'a mut Registry<S>,
    raw: &str,
) -> Result<&'a mut S, Error> {
    let token = codec.decode(raw)?;
    registry.lookup_mut(token).ok_or_else(|| unknown_token(raw))
}

fn unknown_token(raw: &str) -> Error {
    Error::new(ErrorKind::Token)
        .with_message("unknown token")
        .with_detail(raw)
}

/// Shared mapping for `rm` and `rename`: zero matches is a failure here.
fn counted<S: Session>(session: &S, op: &str, code: i32, path: &str) -> Result<Outcome, Error> {
    match code {
        code if code > 0 => Ok(Outcome::Count(count(code))),
        0 => Err(fail(session, op, EngineFault::NoMatch, "no nodes matched path", path)),
        _ => Err(fail(session, op, EngineFault::InvalidPath, "invalid path", path)),
    }
}

fn count(code: i32) -> usize {
    usize::try_from(code).unwrap_or_default()
}

/// Build an engine error; detail is the engine's own diagnostic, else `subject`.
fn fail<S: Session>(session: &S, op: &str, fault: EngineFault, message: &str, subject: &str) -> Error {
    let engine_message = session.error_message();
    tracing::warn!(
        op,
        subject,
        engine = engine_message.as_deref().unwrap_or(""),
        "{}",
        message
    );
    Error::engine(fault)
        .with_message(message)
        .with_detail(engine_message.unwrap_or_else(|| subject.to_string()))
}
