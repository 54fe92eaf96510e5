use std::process::ExitCode;

fn main() -> ExitCode {
    qbeat_cli::run()
}
