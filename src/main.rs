use mimalloc::MiMalloc;
use std::process::ExitCode;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> ExitCode {
    covnorm::init_tracing();
    match covnorm::cli::parse_from_env().and_then(covnorm::run_from_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("covnorm: {error}");
            ExitCode::from(1)
        }
    }
}
