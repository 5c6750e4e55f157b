mod args;
mod commands;
mod error;
mod exit_codes;

pub use args::{Cli, Command};
pub use error::CliError;
pub use exit_codes::ExitCode;

use clap::Parser;
use std::io::Write;

/// Parse arguments, run the requested subcommand, and print its output.
/// This function handles all stdout/stderr output itself; on error it
/// prints a message and returns the matching [`ExitCode`] for the caller
/// to hand to `std::process::exit`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().map_err(|_| ExitCode::INTERNAL)?;
    match runtime.block_on(commands::dispatch(cli)) {
        Ok(Some(bytes)) => {
            let _ = std::io::stdout().write_all(&bytes);
            let _ = std::io::stdout().write_all(b"\n");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            eprintln!("error: {err}");
            Err(err.to_exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_rejects_a_missing_path_with_the_documented_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: None,
            cache_location: Some(camino::Utf8PathBuf::from_path_buf(dir.path().join("cache")).unwrap()),
            version: None,
            max_age: None,
            log_format: None,
            log_level: None,
            command: Command::Check {
                path: camino::Utf8PathBuf::from_path_buf(dir.path().join("missing.txt")).unwrap(),
                hash: false,
            },
        };

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(commands::dispatch(cli));
        let err = result.unwrap_err();
        assert_eq!(err.to_exit_code().as_i32(), ExitCode::PATH_UNREADABLE.as_i32());
    }

    #[test]
    fn store_and_restore_round_trip_through_the_cli_commands() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        std::fs::write(&input, b"payload").unwrap();
        let cache_location = camino::Utf8PathBuf::from_path_buf(dir.path().join("cache")).unwrap();
        let input_path = camino::Utf8PathBuf::from_path_buf(input).unwrap();

        let store_cli = Cli {
            config: None,
            cache_location: Some(cache_location.clone()),
            version: None,
            max_age: None,
            log_format: None,
            log_level: None,
            command: Command::Store { id: "a".to_string(), etag: "e1".to_string(), file: input_path },
        };
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(commands::dispatch(store_cli)).unwrap();

        let restore_cli = Cli {
            config: None,
            cache_location: Some(cache_location),
            version: None,
            max_age: None,
            log_format: None,
            log_level: None,
            command: Command::Restore { id: "a".to_string(), etag: "e1".to_string() },
        };
        let restored = runtime.block_on(commands::dispatch(restore_cli)).unwrap();
        assert_eq!(restored, Some(b"payload".to_vec()));
    }

    #[test]
    fn missing_cache_location_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: None,
            cache_location: None,
            version: None,
            max_age: None,
            log_format: None,
            log_level: None,
            command: Command::Check {
                path: camino::Utf8PathBuf::from_path_buf(dir.path().join("x.txt")).unwrap(),
                hash: false,
            },
        };

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let err = runtime.block_on(commands::dispatch(cli)).unwrap_err();
        assert_eq!(err.to_exit_code().as_i32(), ExitCode::CONFIG.as_i32());
    }

    #[test]
    fn inspect_on_a_fresh_cache_succeeds_with_exit_code_zero() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: None,
            cache_location: Some(camino::Utf8PathBuf::from_path_buf(dir.path().join("cache")).unwrap()),
            version: None,
            max_age: None,
            log_format: None,
            log_level: None,
            command: Command::Inspect,
        };

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(commands::dispatch(cli));
        assert!(result.is_ok());
    }

    // A pack file locked by another process maps to exit code 4, not a
    // generic failure.
    #[test]
    fn gc_against_a_held_lock_reports_the_locked_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let cache_location = camino::Utf8PathBuf::from_path_buf(dir.path().join("cache")).unwrap();
        let _held = cachekit_lock::acquire(&cache_location).unwrap();

        let cli = Cli {
            config: None,
            cache_location: Some(cache_location),
            version: None,
            max_age: None,
            log_format: None,
            log_level: None,
            command: Command::Gc { max_age: None },
        };

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let err = runtime.block_on(commands::dispatch(cli)).unwrap_err();
        assert_eq!(err.to_exit_code().as_i32(), ExitCode::LOCKED.as_i32());
    }
}
