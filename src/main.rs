mod api;
mod cli;
mod commands;
mod config;
mod gcloud;
mod logs;
mod machines;
mod paths;
mod ports;
mod proxy;
mod render;
mod tunnel;

fn main() {
    env_logger::builder().format_timestamp(None).init();

    if let Err(err) = cli::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
