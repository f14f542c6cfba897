//! depwalk - incremental build-dependency analyzer

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = depwalk::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
