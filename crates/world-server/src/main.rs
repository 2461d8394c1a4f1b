use clap::Parser;
use world_server::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    match world_server::run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Every fallible step in `run` before the server tasks are
            // spawned is startup/config work (resource dir, snapshot load,
            // socket binds) — spec §7 "Startup errors ... exit with code 1".
            eprintln!("{e:?}");
            std::process::exit(world_server::EXIT_STARTUP_ERROR);
        }
    }
}
