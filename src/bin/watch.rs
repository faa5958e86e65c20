//! Connects, logs in, and prints every event the session receives until
//! interrupted. A minimal example of the long-lived-listener shape every
//! real AMI client takes: one session, one event callback, running until
//! `ctrl_c`.

use std::sync::Arc;

use ami_client::{Session, SessionConfig};
use clap::Parser;
use tokio::signal;

#[derive(Parser)]
#[command(name = "ami-watch", about = "Print every AMI event until interrupted")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = ami_client::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = "admin")]
    username: String,

    #[arg(long)]
    secret: String,
}

#[tokio::main]
async fn main() -> ami_client::Result<()> {
    tracing_subscriber::fmt::try_init()?;

    let cli = Cli::parse();
    let config = SessionConfig::new(cli.host, cli.port);

    let on_event: ami_client::EventCallback = Arc::new(|event| {
        println!("{event}");
    });
    let on_disconnect: ami_client::DisconnectCallback = Arc::new(|| {
        eprintln!("session disconnected");
    });

    let session = Session::connect(config, Some(on_event), Some(on_disconnect)).await?;
    if !session.login(&cli.username, &cli.secret).await? {
        eprintln!("login failed");
        session.disconnect().await?;
        std::process::exit(1);
    }

    signal::ctrl_c().await?;
    session.disconnect().await?;
    Ok(())
}
