use content_pipeline::BuildError;
use content_pipeline::cli::run_with_config;
use content_pipeline::config::load_config;

fn main() -> Result<(), BuildError> {
    let config = load_config();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_filter))
        .init();
    run_with_config(std::env::args().collect(), config)
}
