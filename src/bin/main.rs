use std::process::ExitCode;

fn main() -> ExitCode {
    match obo_graph::cli::main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
