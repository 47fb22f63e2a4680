use accrual_worker::{cli::handle_command_line_args, config::WorkerConfig, worker::run_worker};
use dotenvy::dotenv;
use log::info;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = WorkerConfig::from_env_or_default();

    info!(
        "🚀️ Starting accrual worker against {} with {} workers",
        config.engine.accrual_address,
        config.engine.worker_count()
    );
    match run_worker(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        },
    }
}
