use clap::Parser;
use log::info;
use server::network::Server;
use shared::GameArgs;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, env = "SERVER_PORT", default_value = "8765")]
    port: u16,
    /// Maximum number of simultaneous connections
    #[clap(short = 'm', long, env = "MAX_CONNECTIONS", default_value = "64")]
    max_connections: usize,
    #[clap(flatten)]
    game: GameArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = args.game.into_config();
    let address = format!("{}:{}", args.host, args.port);

    let server = Server::bind(&address, config, args.max_connections).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
