//! Purpose: Safe wrapper over libaugeas implementing the engine contract.
//! Exports: `LibAugeas`, `AugeasSession`.
//! Role: Native engine used when the crate is built with the `libaugeas` feature.
//! Invariants: All FFI interaction is confined to this module + `sys`.
//! Invariants: Strings returned by libaugeas are copied before the next call and
//! Invariants: every malloc'd result (`aug_match`, `aug_span`) is freed here.
//! Invariants: Arguments with interior NUL bytes never reach C; they report `-1`.
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint};
use std::ptr::{self, NonNull};

use crate::core::engine::{Engine, InitFlags, RawSpan, Session};

pub mod sys;

#[derive(Clone, Debug, Default)]
pub struct LibAugeas;

impl LibAugeas {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for LibAugeas {
    type Session = AugeasSession;

    fn init(&mut self, root: &str, loadpath: Option<&str>, flags: InitFlags) -> Option<AugeasSession> {
        let root = CString::new(root).ok()?;
        let loadpath = match loadpath {
            Some(loadpath) => Some(CString::new(loadpath).ok()?),
            None => None,
        };
        let loadpath_ptr = loadpath.as_ref().map_or(ptr::null(), |s| s.as_ptr());
        let raw = unsafe { sys::aug_init(root.as_ptr(), loadpath_ptr, flags.bits() as c_uint) };
        let ptr = NonNull::new(raw)?;
        let session = AugeasSession { ptr };
        // With NO_ERR_CLOSE the engine hands back a handle even when init failed.
        if session.last_error_code() != sys::AUG_NOERROR {
            tracing::warn!(
                error = session.error_message().as_deref().unwrap_or("unknown"),
                "aug_init reported an error"
            );
            return None;
        }
        Some(session)
    }
}

#[derive(Debug)]
pub struct AugeasSession {
    ptr: NonNull<sys::augeas>,
}

// The handle is only ever used by one thread at a time: sessions live inside a
// registry that hosts guard with a single lock.
unsafe impl Send for AugeasSession {}

impl AugeasSession {
    fn raw(&self) -> *mut sys::augeas {
        self.ptr.as_ptr()
    }

    fn last_error_code(&self) -> c_int {
        unsafe { sys::aug_error(self.raw()) }
    }
}

impl Drop for AugeasSession {
    fn drop(&mut self) {
        unsafe { sys::aug_close(self.raw()) };
    }
}

fn c_arg(value: &str) -> Option<CString> {
    CString::new(value).ok()
}

unsafe fn copy_c_str(raw: *const c_char) -> Option<String> {
    if raw.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned())
}

impl Session for AugeasSession {
    fn close(self) {
        drop(self);
    }

    fn save(&mut self) -> i32 {
        unsafe { sys::aug_save(self.raw()) }
    }

    fn load(&mut self) -> i32 {
        unsafe { sys::aug_load(self.raw()) }
    }

    fn get(&self, path: &str) -> (i32, Option<String>) {
        let Some(path) = c_arg(path) else {
            return (-1, None);
        };
        let mut value: *const c_char = ptr::null();
        let code = unsafe { sys::aug_get(self.raw(), path.as_ptr(), &mut value) };
        let value = if code == 1 {
            unsafe { copy_c_str(value) }
        } else {
            None
        };
        (code, value)
    }

    fn set(&mut self, path: &str, value: Option<&str>) -> i32 {
        let Some(path) = c_arg(path) else {
            return -1;
        };
        let value = match value {
            Some(value) => match c_arg(value) {
                Some(value) => Some(value),
                None => return -1,
            },
            None => None,
        };
        let value_ptr = value.as_ref().map_or(ptr::null(), |s| s.as_ptr());
        unsafe { sys::aug_set(self.raw(), path.as_ptr(), value_ptr) }
    }

    fn setm(&mut self, base: &str, sub: Option<&str>, value: &str) -> i32 {
        let (Some(base), Some(value)) = (c_arg(base), c_arg(value)) else {
            return -1;
        };
        let sub = match sub {
            Some(sub) => match c_arg(sub) {
                Some(sub) => Some(sub),
                None => return -1,
            },
            None => None,
        };
        let sub_ptr = sub.as_ref().map_or(ptr::null(), |s| s.as_ptr());
        unsafe { sys::aug_setm(self.raw(), base.as_ptr(), sub_ptr, value.as_ptr()) }
    }

    fn insert(&mut self, path: &str, label: &str, before: bool) -> i32 {
        let (Some(path), Some(label)) = (c_arg(path), c_arg(label)) else {
            return -1;
        };
        unsafe {
            sys::aug_insert(
                self.raw(),
                path.as_ptr(),
                label.as_ptr(),
                c_int::from(before),
            )
        }
    }

    fn mv(&mut self, src: &str, dst: &str) -> i32 {
        let (Some(src), Some(dst)) = (c_arg(src), c_arg(dst)) else {
            return -1;
        };
        unsafe { sys::aug_mv(self.raw(), src.as_ptr(), dst.as_ptr()) }
    }

    fn rm(&mut self, path: &str) -> i32 {
        let Some(path) = c_arg(path) else {
            return -1;
        };
        unsafe { sys::aug_rm(self.raw(), path.as_ptr()) }
    }

    fn rename(&mut self, src: &str, label: &str) -> i32 {
        let (Some(src), Some(label)) = (c_arg(src), c_arg(label)) else {
            return -1;
        };
        unsafe { sys::aug_rename(self.raw(), src.as_ptr(), label.as_ptr()) }
    }

    fn matches(&self, path: &str) -> (i32, Vec<String>) {
        let Some(path) = c_arg(path) else {
            return (-1, Vec::new());
        };
        let mut raw: *mut *mut c_char = ptr::null_mut();
        let code = unsafe { sys::aug_match(self.raw(), path.as_ptr(), &mut raw) };
        let mut paths = Vec::new();
        if !raw.is_null() {
            let count = usize::try_from(code).unwrap_or(0);
            for idx in 0..count {
                unsafe {
                    let item = *raw.add(idx);
                    if let Some(path) = copy_c_str(item) {
                        paths.push(path);
                    }
                    libc::free(item.cast());
                }
            }
            unsafe { libc::free(raw.cast()) };
        }
        (code, paths)
    }

    fn span(&self, path: &str) -> (i32, Option<RawSpan>) {
        let Some(path) = c_arg(path) else {
            return (-1, None);
        };
        let mut filename: *mut c_char = ptr::null_mut();
        let mut offsets: [c_uint; 6] = [0; 6];
        let [ls, le, vs, ve, ss, se] = &mut offsets;
        let code = unsafe {
            sys::aug_span(
                self.raw(),
                path.as_ptr(),
                &mut filename,
                ls,
                le,
                vs,
                ve,
                ss,
                se,
            )
        };
        let name = unsafe { copy_c_str(filename) };
        if !filename.is_null() {
            unsafe { libc::free(filename.cast()) };
        }
        if code != 0 {
            return (code, None);
        }
        let span = RawSpan {
            filename: name.unwrap_or_default(),
            label_start: offsets[0],
            label_end: offsets[1],
            value_start: offsets[2],
            value_end: offsets[3],
            span_start: offsets[4],
            span_end: offsets[5],
        };
        (code, Some(span))
    }

    fn error_message(&self) -> Option<String> {
        if self.last_error_code() == sys::AUG_NOERROR {
            return None;
        }
        let message = unsafe { copy_c_str(sys::aug_error_message(self.raw())) }?;
        match unsafe { copy_c_str(sys::aug_error_details(self.raw())) } {
            Some(details) if !details.is_empty() => Some(format!("{message}: {details}")),
            _ => Some(message),
        }
    }
}
