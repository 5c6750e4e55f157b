//! cachekit CLI binary
//!
//! This is the minimal entrypoint for the cachekit CLI. All logic lives in
//! `cachekit_cli`; main.rs only invokes `run()` and maps its result to a
//! process exit code.

fn main() {
    if let Err(code) = cachekit_cli::run() {
        std::process::exit(code.as_i32());
    }
}
