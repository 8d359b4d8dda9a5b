use std::process::ExitCode;

fn main() -> ExitCode {
    match tetherd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("tetherd: {error}");
            ExitCode::FAILURE
        }
    }
}
