//! Purpose: C ABI bridge for embedding a host session (libaugbridge).
//! Exports: `augb_session_new`, `augb_session_invoke`, free functions for sessions/buffers/errors.
//! Role: Stable ABI surface for non-Rust hosts.
//! Invariants: argv in, JSON bytes out; opaque handles; explicit free functions.
//! Invariants: Error kinds use the same numeric codes as the CLI exit status.
//! Invariants: Freeing a session tears it down, closing every live engine handle.
#![allow(clippy::result_large_err)]

use crate::api::{DefaultEngine, HostSession, SessionConfig, to_exit_code};
use crate::core::error::{Error, ErrorKind};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Mutex;

#[allow(non_camel_case_types)]
pub struct augb_session {
    inner: Mutex<HostSession<DefaultEngine>>,
}

#[allow(non_camel_case_types)]
#[repr(C)]
pub struct augb_buf {
    data: *mut u8,
    len: usize,
}

#[allow(non_camel_case_types)]
#[repr(C)]
pub struct augb_error {
    kind: i32,
    message: *mut c_char,
    detail: *mut c_char,
}

/// Create a session. `namespace` may be null for the default `::augeas`.
#[unsafe(no_mangle)]
pub extern "C" fn augb_session_new(
    namespace: *const c_char,
    out_session: *mut *mut augb_session,
    out_err: *mut *mut augb_error,
) -> i32 {
    if out_session.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("out_session is null"),
        );
    }
    let config = if namespace.is_null() {
        SessionConfig::default()
    } else {
        match unsafe { CStr::from_ptr(namespace) }.to_str() {
            Ok(namespace) => SessionConfig::with_namespace(namespace),
            Err(_) => {
                return fail(
                    out_err,
                    Error::new(ErrorKind::Conversion).with_message("namespace is not valid UTF-8"),
                );
            }
        }
    };
    let session = match HostSession::new(DefaultEngine::default(), config) {
        Ok(session) => session,
        Err(err) => return fail(out_err, err),
    };
    let handle = Box::new(augb_session {
        inner: Mutex::new(session),
    });
    unsafe {
        *out_session = Box::into_raw(handle);
    }
    0
}

/// Run one command. `argv[0]` is the command name; the outcome JSON lands in `out_result`.
#[unsafe(no_mangle)]
pub extern "C" fn augb_session_invoke(
    session: *mut augb_session,
    argv: *const *const c_char,
    argc: usize,
    out_result: *mut augb_buf,
    out_err: *mut *mut augb_error,
) -> i32 {
    let session = match borrow_session(session, out_err) {
        Ok(session) => session,
        Err(code) => return code,
    };
    if out_result.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("out_result is null"),
        );
    }
    let args = match parse_argv(argv, argc) {
        Ok(args) => args,
        Err(err) => return fail(out_err, err),
    };
    let mut guard = match session.inner.lock() {
        Ok(guard) => guard,
        Err(_) => {
            return fail(
                out_err,
                Error::new(ErrorKind::Internal).with_message("session lock poisoned"),
            );
        }
    };
    let outcome = match guard.invoke_argv(&args) {
        Ok(outcome) => outcome,
        Err(err) => return fail(out_err, err),
    };
    drop(guard);
    let bytes = match serde_json::to_vec(&outcome) {
        Ok(bytes) => bytes,
        Err(err) => {
            return fail(
                out_err,
                Error::new(ErrorKind::Internal)
                    .with_message("failed to serialize outcome")
                    .with_source(err),
            );
        }
    };
    write_buf(out_result, bytes);
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn augb_session_free(session: *mut augb_session) {
    if session.is_null() {
        return;
    }
    let augb_session { inner } = *unsafe { Box::from_raw(session) };
    let host = match inner.into_inner() {
        Ok(host) => host,
        Err(poisoned) => poisoned.into_inner(),
    };
    host.shutdown();
}

#[unsafe(no_mangle)]
pub extern "C" fn augb_buf_free(buf: *mut augb_buf) {
    if buf.is_null() {
        return;
    }
    unsafe {
        let buf = &mut *buf;
        if !buf.data.is_null() && buf.len != 0 {
            drop(Vec::from_raw_parts(buf.data, buf.len, buf.len));
        }
        buf.data = ptr::null_mut();
        buf.len = 0;
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn augb_error_free(err: *mut augb_error) {
    if err.is_null() {
        return;
    }
    unsafe {
        let err = Box::from_raw(err);
        if !err.message.is_null() {
            drop(CString::from_raw(err.message));
        }
        if !err.detail.is_null() {
            drop(CString::from_raw(err.detail));
        }
    }
}

fn borrow_session<'a>(
    session: *mut augb_session,
    out_err: *mut *mut augb_error,
) -> Result<&'a augb_session, i32> {
    if session.is_null() {
        return Err(fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("session is null"),
        ));
    }
    unsafe { Ok(&*session) }
}

fn parse_argv(argv: *const *const c_char, argc: usize) -> Result<Vec<String>, Error> {
    if argv.is_null() || argc == 0 {
        return Err(Error::new(ErrorKind::Usage).with_message("missing command name"));
    }
    let slice = unsafe { std::slice::from_raw_parts(argv, argc) };
    let mut out = Vec::with_capacity(argc);
    for item in slice {
        if item.is_null() {
            return Err(Error::new(ErrorKind::Usage).with_message("argv contains null"));
        }
        let value = unsafe { CStr::from_ptr(*item) }
            .to_str()
            .map_err(|_| Error::new(ErrorKind::Conversion).with_message("argv invalid UTF-8"))?
            .to_string();
        out.push(value);
    }
    Ok(out)
}

fn write_buf(out: *mut augb_buf, bytes: Vec<u8>) {
    unsafe {
        let buf = &mut *out;
        let mut data = bytes.into_boxed_slice();
        buf.len = data.len();
        buf.data = data.as_mut_ptr();
        std::mem::forget(data);
    }
}

fn fail(out_err: *mut *mut augb_error, err: Error) -> i32 {
    if out_err.is_null() {
        return -1;
    }
    let error = Box::new(augb_error {
        kind: to_exit_code(err.kind()),
        message: to_c_string(err.message().unwrap_or("")),
        detail: err.detail().map(to_c_string).unwrap_or(ptr::null_mut()),
    });
    unsafe {
        *out_err = Box::into_raw(error);
    }
    -1
}

fn to_c_string(input: &str) -> *mut c_char {
    CString::new(input)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

#[cfg(all(test, not(feature = "libaugeas")))]
mod tests {
    use super::*;

    fn invoke(session: *mut augb_session, argv: &[&str]) -> Result<String, (i32, String)> {
        let owned: Vec<CString> = argv.iter().map(|a| CString::new(*a).expect("cstr")).collect();
        let ptrs: Vec<*const c_char> = owned.iter().map(|c| c.as_ptr()).collect();
        let mut buf = augb_buf {
            data: ptr::null_mut(),
            len: 0,
        };
        let mut err: *mut augb_error = ptr::null_mut();
        let rc = augb_session_invoke(session, ptrs.as_ptr(), ptrs.len(), &mut buf, &mut err);
        if rc == 0 {
            let text = unsafe { std::slice::from_raw_parts(buf.data, buf.len) };
            let text = String::from_utf8(text.to_vec()).expect("utf8");
            augb_buf_free(&mut buf);
            Ok(text)
        } else {
            let (kind, message) = unsafe {
                let e = &*err;
                (e.kind, CStr::from_ptr(e.message).to_string_lossy().into_owned())
            };
            augb_error_free(err);
            Err((kind, message))
        }
    }

    #[test]
    fn session_round_trip_through_c_abi() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_string_lossy().into_owned();
        let mut session: *mut augb_session = ptr::null_mut();
        let mut err: *mut augb_error = ptr::null_mut();
        assert_eq!(augb_session_new(ptr::null(), &mut session, &mut err), 0);

        let token = invoke(session, &["init", &root]).expect("init");
        assert_eq!(token, r#"{"kind":"token","value":"::augeas::1"}"#);
        invoke(session, &["set", "::augeas::1", "/a/b", "v"]).expect("set");
        let value = invoke(session, &["get", "::augeas::1", "/a/b"]).expect("get");
        assert_eq!(value, r#"{"kind":"value","value":"v"}"#);

        let (kind, message) = invoke(session, &["get", "::augeas::7", "/a"]).expect_err("token");
        assert_eq!(kind, to_exit_code(ErrorKind::Token));
        assert_eq!(message, "unknown token");

        augb_session_free(session);
    }

    #[test]
    fn null_out_pointers_are_usage_errors() {
        let mut err: *mut augb_error = ptr::null_mut();
        assert_eq!(augb_session_new(ptr::null(), ptr::null_mut(), &mut err), -1);
        let kind = unsafe { (*err).kind };
        assert_eq!(kind, to_exit_code(ErrorKind::Usage));
        augb_error_free(err);
        augb_session_free(ptr::null_mut());
    }
}
