//! Purpose: Run a host session over a newline-delimited JSON transport.
//! Exports: `serve`, `parse_request_line`.
//! Role: Bridge JSON-array request lines to `HostSession::invoke_argv`.
//! Invariants: The writer only receives envelopes (one JSON value per line).
//! Invariants: A bad line yields an error envelope and the loop continues.
//! Invariants: Reader EOF returns cleanly; the caller owns session teardown.
use std::io::{BufRead, Write};

use augeas_bridge::api::{Engine, Error, ErrorKind, HostSession, result_value};
use serde_json::Value;

/// Serve requests until EOF; returns how many requests were answered.
pub(super) fn serve<E, R, W>(
    session: &mut HostSession<E>,
    mut reader: R,
    mut writer: W,
) -> Result<usize, Error>
where
    E: Engine,
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    let mut answered = 0;

    loop {
        line.clear();
        let read = reader.read_line(&mut line).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read request")
                .with_source(err)
        })?;
        if read == 0 {
            writer.flush().map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to flush output")
                    .with_source(err)
            })?;
            return Ok(answered);
        }

        let message = line.trim_end_matches(['\n', '\r']);
        if message.trim().is_empty() {
            continue;
        }

        let result = parse_request_line(message).and_then(|argv| session.invoke_argv(&argv));
        if let Err(err) = &result {
            tracing::debug!(error = %err, "request failed");
        }
        write_json_line(&mut writer, &result_value(&result))?;
        answered += 1;
    }
}

/// A request is a JSON array: command name first, then string or number arguments.
pub(super) fn parse_request_line(line: &str) -> Result<Vec<String>, Error> {
    let value: Value = serde_json::from_str(line).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("request is not valid JSON")
            .with_source(err)
    })?;
    let Value::Array(items) = value else {
        return Err(Error::new(ErrorKind::Usage).with_message("request must be a JSON array"));
    };
    if items.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("missing command name"));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::String(text) => Ok(text),
            Value::Number(number) if idx > 0 => Ok(number.to_string()),
            other => Err(Error::new(ErrorKind::Conversion)
                .with_message("request arguments must be strings or numbers")
                .with_detail(other.to_string())),
        })
        .collect()
}

fn write_json_line<W: Write>(writer: &mut W, payload: &Value) -> Result<(), Error> {
    serde_json::to_writer(&mut *writer, payload).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode response")
            .with_source(err)
    })?;
    writer.write_all(b"\n").map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write response")
            .with_source(err)
    })?;
    writer.flush().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to flush response")
            .with_source(err)
    })
}
