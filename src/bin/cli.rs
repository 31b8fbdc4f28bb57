use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing::subscriber as tracing_subscriber_global;
use anyhow::{Result, Context};
use playlist_update_notifier as lib;
use lib::config::Config;
use lib::models::MailConfig;
use lib::poller::Poller;

#[derive(Parser)]
#[command(name = "playlist-update-notifier", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poller (long-running)
    Poll,
    /// Run a single poll cycle and exit
    CheckOnce,
    /// Show tracked connections, playlists and subscriber counts
    Status,
    /// Validate config file and exit
    ConfigValidate,
    /// Manage provider connections
    Connection {
        #[command(subcommand)]
        sub: ConnectionCommands,
    },
    /// Manage tracked playlists
    Playlist {
        #[command(subcommand)]
        sub: PlaylistCommands,
    },
    /// Subscribe an email address to a tracked playlist
    Subscribe {
        /// Playlist id from `status`
        #[arg(long)]
        playlist_id: i64,

        /// Address to add
        #[arg(long)]
        email: String,
    },
    /// Set the outbound mail configuration
    MailSet {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum ConnectionCommands {
    /// Register provider credentials and print the new connection id
    Add {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
    },
}

#[derive(Subcommand)]
enum PlaylistCommands {
    /// Track an external playlist under a connection
    Add {
        #[arg(long)]
        connection_id: i64,
        #[arg(long)]
        external_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Resolve config path: explicit --config overrides; otherwise prefer
    // system-wide /etc/playlist-notifier/config.toml and fall back to the
    // repository example config for local/dev usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let etc_path = Path::new("/etc/playlist-notifier/config.toml");
            if etc_path.exists() {
                etc_path.to_path_buf()
            } else {
                PathBuf::from("config/example-config.toml")
            }
        }
    };

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to both stdout and a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender = tracing_appender::rolling::daily(&cfg.log_dir, "playlist-notifier.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(non_blocking);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    tracing_subscriber_global::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    match cli.command {
        Commands::Poll => {
            let poller = Poller::new(cfg);
            tokio::select! {
                res = poller.run() => {
                    res.with_context(|| "running poller".to_string())?;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received interrupt; shutting down");
                }
            }
        }
        Commands::CheckOnce => {
            let poller = Poller::new(cfg);
            let report = poller.run_cycle().await
                .with_context(|| "running poll cycle".to_string())?;
            println!(
                "Checked {} playlist(s); sent {} digest(s); skipped {} notification(s).",
                report.playlists_checked, report.digests_sent, report.notifications_skipped
            );
        }
        Commands::Status => {
            let conn = lib::db::open_or_create(&cfg.db_path)
                .with_context(|| format!("opening DB at {}", cfg.db_path.display()))?;
            let connections = lib::db::list_connections(&conn)?;
            println!("{} connection(s):", connections.len());
            for c in &connections {
                println!("- id: {} | client_id: {}", c.id, c.client_id);
            }
            let playlists = lib::db::playlist_overview(&conn)?;
            println!("{} tracked playlist(s):", playlists.len());
            for (id, connection_id, external_id, polled, subscribers) in playlists {
                println!(
                    "- id: {} | connection: {} | external: {} | baseline: {} | subscriber(s): {}",
                    id,
                    connection_id,
                    external_id,
                    if polled { "yes" } else { "never polled" },
                    subscribers
                );
            }
            match lib::db::load_mail_config(&conn)? {
                Some(mail) => println!("Mail: {} via {}:{}", mail.sender, mail.host, mail.port),
                None => println!("Mail: not configured"),
            }
        }
        Commands::ConfigValidate => {
            match Config::from_path(resolved_config_path.as_path()) {
                Ok(_) => println!("OK"),
                Err(e) => {
                    eprintln!("Config validation failed: {}", e);
                    std::process::exit(2);
                }
            }
        }
        Commands::Connection { sub } => match sub {
            ConnectionCommands::Add { client_id, client_secret } => {
                let conn = lib::db::open_or_create(&cfg.db_path)?;
                let id = lib::db::add_connection(&conn, &client_id, &client_secret)?;
                println!("Added connection {}", id);
            }
        },
        Commands::Playlist { sub } => match sub {
            PlaylistCommands::Add { connection_id, external_id } => {
                let conn = lib::db::open_or_create(&cfg.db_path)?;
                let id = lib::db::track_playlist(&conn, connection_id, &external_id)?;
                println!("Tracking playlist {} as id {}", external_id, id);
            }
        },
        Commands::Subscribe { playlist_id, email } => {
            let conn = lib::db::open_or_create(&cfg.db_path)?;
            lib::db::subscribe_email(&conn, playlist_id, &email)?;
            println!("Subscribed {} to playlist {}", email, playlist_id);
        }
        Commands::MailSet { sender, host, port, password } => {
            let conn = lib::db::open_or_create(&cfg.db_path)?;
            lib::db::set_mail_config(&conn, &MailConfig { sender, host, port, password })?;
            println!("Mail configuration saved");
        }
    }

    Ok(())
}
