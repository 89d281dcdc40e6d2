use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    ExitCode::from(images2pdf::cli::run(std::env::args_os()))
}
