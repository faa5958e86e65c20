use ami_client::{Session, SessionConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ami-cli", about = "Issue one AMI action and print its response")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = ami_client::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = "admin")]
    username: String,

    #[arg(long)]
    secret: String,
}

#[derive(Subcommand)]
enum Command {
    /// Read a channel or global variable.
    Getvar {
        variable: String,
        #[arg(long)]
        channel: Option<String>,
    },
    /// Set a channel or global variable.
    Setvar {
        variable: String,
        value: String,
        #[arg(long)]
        channel: Option<String>,
    },
    /// Originate a call into a dialplan extension.
    OriginateExten {
        channel: String,
        context: String,
        exten: String,
        priority: u32,
        #[arg(long)]
        caller_id: Option<String>,
    },
    /// Reload a single module.
    Reload { module: String },
}

/// CLI entry point.
///
/// `flavor = "current_thread"` the way a short-lived, single-session tool
/// should — there's no benefit here to the overhead of the multi-thread
/// scheduler.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ami_client::Result<()> {
    tracing_subscriber::fmt::try_init()?;

    let cli = Cli::parse();
    let config = SessionConfig::new(cli.host, cli.port);
    let session = Session::connect(config, None, None).await?;

    if !session.login(&cli.username, &cli.secret).await? {
        eprintln!("login failed");
        session.disconnect().await?;
        std::process::exit(1);
    }

    match cli.command {
        Command::Getvar { variable, channel } => {
            match session.getvar(channel.as_deref(), &variable).await? {
                Some(value) => println!("{value}"),
                None => println!("(nil)"),
            }
        }
        Command::Setvar {
            variable,
            value,
            channel,
        } => {
            let ok = session.setvar(channel.as_deref(), &variable, &value).await?;
            println!("{}", if ok { "OK" } else { "FAILED" });
        }
        Command::OriginateExten {
            channel,
            context,
            exten,
            priority,
            caller_id,
        } => {
            let ok = session
                .originate_exten(&channel, &context, &exten, priority, caller_id.as_deref())
                .await?;
            println!("{}", if ok { "OK" } else { "FAILED" });
        }
        Command::Reload { module } => {
            let ok = session.reload(&module).await?;
            println!("{}", if ok { "OK" } else { "FAILED" });
        }
    }

    session.disconnect().await?;
    Ok(())
}
