//! Purpose: Link the native augeas library when the `libaugeas` feature is enabled.
//! Role: Cargo build-script; emits link directives and rebuild triggers.
//! Invariants: Without the feature nothing is linked; the memory engine needs no native code.
//! Invariants: `AUGEAS_LIB_DIR` adds a search path ahead of the system defaults.
//! Invariants: Uses only Cargo-provided env vars plus `AUGEAS_LIB_DIR`.
use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=AUGEAS_LIB_DIR");

    if env::var_os("CARGO_FEATURE_LIBAUGEAS").is_none() {
        return;
    }

    if let Some(dir) = env::var_os("AUGEAS_LIB_DIR") {
        let dir = PathBuf::from(dir);
        if !dir.is_dir() {
            println!(
                "cargo:warning=AUGEAS_LIB_DIR={} is not a directory; falling back to system paths",
                dir.display()
            );
        } else {
            println!("cargo:rustc-link-search=native={}", dir.display());
        }
    }
    println!("cargo:rustc-link-lib=dylib=augeas");
}
