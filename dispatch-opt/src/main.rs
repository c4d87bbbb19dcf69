use dispatch_opt::cli::run_cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if dispatch_opt::log::is_logger_initialised() {
                ::log::error!("{:?}", err);
            } else {
                eprintln!("Error: {:?}", err);
            }
            ExitCode::FAILURE
        }
    }
}
