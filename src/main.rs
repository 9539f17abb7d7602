// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, load config, build the HTTP
//   client and hand everything to the UI loop.

use pet_drive::{api::HttpClient, config::Config, ui::main_menu};

fn main() -> anyhow::Result<()> {
    // Warnings (skipped images, failed uploads) are shown by default;
    // `RUST_LOG=debug` adds every request and its status.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::from_env()?;
    let http = HttpClient::new(config.http_timeout)?;

    // Start the interactive menu. This call blocks until the user exits.
    main_menu(&config, http)?;
    Ok(())
}
