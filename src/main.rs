use std::process::ExitCode;

use herd_immunity::runner::run_with_args;

fn main() -> ExitCode {
    match run_with_args() {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
