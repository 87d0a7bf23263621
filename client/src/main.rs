use clap::Parser;
use client::input::WanderingBot;
use client::network::{Client, ClientOptions, RoomPlan};
use log::info;
use shared::GameArgs;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket URL of the server
    #[clap(short = 's', long, env = "SERVER_URL", default_value = "ws://127.0.0.1:8765")]
    server: String,

    /// Display name in the room
    #[clap(short = 'n', long, default_value = "")]
    name: String,

    /// Create a room with this name and host it
    #[clap(long, conflicts_with = "join")]
    create: Option<String>,

    /// Join the room with this id (default: first open room)
    #[clap(long)]
    join: Option<String>,

    /// Capacity of a created room
    #[clap(long, default_value = "4")]
    max_players: u32,

    /// As host, start the game once this many players are present (0 = never)
    #[clap(long, default_value = "2")]
    start_with: u32,

    /// Keep playing after the game is decided
    #[clap(long)]
    stay: bool,

    /// Seconds between bot shots (0 = never shoot)
    #[clap(long, default_value = "1.0")]
    fire_interval: f64,

    /// Seed for the bot's movement
    #[clap(long)]
    seed: Option<u64>,

    /// Simulate network latency in milliseconds
    #[clap(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    #[clap(flatten)]
    game: GameArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = args.game.into_config();

    let plan = match (args.create, args.join) {
        (Some(name), _) => RoomPlan::Create {
            name,
            max_players: args.max_players,
        },
        (None, Some(room_id)) => RoomPlan::Join(room_id),
        (None, None) => RoomPlan::JoinAny,
    };
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    let bot = WanderingBot::new(seed, args.fire_interval, config.arena_width, config.arena_height);
    let options = ClientOptions {
        server_url: args.server,
        player_name: args.name,
        plan,
        start_with: args.start_with,
        exit_on_outcome: !args.stay,
        fake_ping_ms: args.fake_ping,
    };
    let mut client = Client::new(options, config, Box::new(bot));

    tokio::select! {
        result = client.run() => {
            match result? {
                Some(outcome) => info!("Finished: {:?}", outcome),
                None => info!("Disconnected before the game was decided"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving");
        }
    }

    Ok(())
}
