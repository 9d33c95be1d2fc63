use clap::Parser;
use turnpike::{
    config::{Cli, Command},
    scanner, socks,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::builder()
        .format_module_path(false)
        .filter_level(if cli.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    match cli.command {
        Command::Socks(options) => socks::run(options).await,
        Command::Scan(options) => scanner::run(options).await,
    }
}
