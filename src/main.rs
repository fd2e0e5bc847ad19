use clap::Parser;
use ircget::{
    Collaborators, Config, IrcControl, NativeExtractor, Session, TcpConnector, TerminalPrompt,
    event_channel, run_with_shutdown,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long the control connection gets to flush QUIT after the session ends
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "ircget")]
#[command(version, about = "Search IRC file bots and download results over DCC SEND")]
struct Cli {
    /// IRC server hostname
    server: String,

    /// Nickname to use
    nickname: String,

    /// Channel the search bot lives in, e.g. "#ebooks"
    channel: String,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML configuration file; command line arguments take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for downloads and the search listing
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Connect with TLS
    #[arg(long)]
    tls: bool,

    /// Seconds a DCC connection may stay silent; 0 waits forever
    #[arg(long, value_name = "SECS")]
    idle_timeout: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> ircget::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::default(),
        };
        config.irc.server = self.server;
        config.irc.nickname = self.nickname;
        config.irc.channel = self.channel;
        if let Some(port) = self.port {
            config.irc.port = port;
        }
        if self.tls {
            config.irc.use_tls = true;
        }
        if let Some(secs) = self.idle_timeout {
            config.download.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(dir) = self.download_dir {
            config.download.download_dir = dir;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start the async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // a pending stdin read must not keep the process alive
    runtime.shutdown_timeout(Duration::from_millis(100));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ircget::Result<()> {
    let config = cli.into_config()?;
    tokio::fs::create_dir_all(config.download_dir()).await?;

    let (events_tx, events_rx) = event_channel();
    let (control, reader) = IrcControl::connect(&config.irc, events_tx.clone()).await?;
    let prompt = Arc::new(TerminalPrompt);
    let session = Session::new(
        config,
        Collaborators {
            control: Arc::new(control),
            connector: Arc::new(TcpConnector),
            extractor: Arc::new(NativeExtractor),
            query: prompt.clone(),
            selection: prompt,
        },
        events_tx,
        events_rx,
    );

    let result = run_with_shutdown(session).await;

    // give the reader task a chance to flush QUIT and see the server close
    if tokio::time::timeout(DISCONNECT_GRACE, reader).await.is_err() {
        tracing::debug!("server did not close the connection in time");
    }
    result
}
