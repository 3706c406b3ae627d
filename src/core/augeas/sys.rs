// Raw FFI bindings to libaugeas.
use std::os::raw::{c_char, c_int, c_uint};

#[repr(C)]
pub struct augeas {
    _private: [u8; 0],
}

pub const AUG_NOERROR: c_int = 0;

unsafe extern "C" {
    pub fn aug_init(root: *const c_char, loadpath: *const c_char, flags: c_uint) -> *mut augeas;

    pub fn aug_close(aug: *mut augeas);

    pub fn aug_save(aug: *mut augeas) -> c_int;

    pub fn aug_load(aug: *mut augeas) -> c_int;

    pub fn aug_get(aug: *const augeas, path: *const c_char, value: *mut *const c_char) -> c_int;

    pub fn aug_set(aug: *mut augeas, path: *const c_char, value: *const c_char) -> c_int;

    pub fn aug_setm(
        aug: *mut augeas,
        base: *const c_char,
        sub: *const c_char,
        value: *const c_char,
    ) -> c_int;

    pub fn aug_insert(
        aug: *mut augeas,
        path: *const c_char,
        label: *const c_char,
        before: c_int,
    ) -> c_int;

    pub fn aug_mv(aug: *mut augeas, src: *const c_char, dst: *const c_char) -> c_int;

    pub fn aug_rm(aug: *mut augeas, path: *const c_char) -> c_int;

    pub fn aug_rename(aug: *mut augeas, src: *const c_char, lbl: *const c_char) -> c_int;

    pub fn aug_match(
        aug: *const augeas,
        path: *const c_char,
        matches: *mut *mut *mut c_char,
    ) -> c_int;

    pub fn aug_span(
        aug: *mut augeas,
        path: *const c_char,
        filename: *mut *mut c_char,
        label_start: *mut c_uint,
        label_end: *mut c_uint,
        value_start: *mut c_uint,
        value_end: *mut c_uint,
        span_start: *mut c_uint,
        span_end: *mut c_uint,
    ) -> c_int;

    pub fn aug_error(aug: *mut augeas) -> c_int;

    pub fn aug_error_message(aug: *mut augeas) -> *const c_char;

    pub fn aug_error_details(aug: *mut augeas) -> *const c_char;
}
