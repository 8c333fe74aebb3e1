use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;

/// The serving variant exposed by the event routes.
///
/// Both stream registries exist in every process; the mode only decides which
/// handler set the router mounts under `/events`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamMode {
    /// Anonymous multi-subscriber fan-out keyed by category.
    Broadcast,
    /// Single-consumer streams keyed by session id.
    Session,
}

#[derive(Debug, PartialEq, Eq)]
pub struct StreamModeParseError;

impl FromStr for StreamMode {
    type Err = StreamModeParseError;
    fn from_str(mode: &str) -> Result<StreamMode, Self::Err> {
        match mode.to_lowercase().as_str() {
            "broadcast" => Ok(StreamMode::Broadcast),
            "session" => Ok(StreamMode::Session),
            _ => Err(StreamModeParseError),
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StreamMode::Broadcast => write!(f, "broadcast"),
            StreamMode::Session => write!(f, "session"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Select which event stream variant the server exposes.
    #[arg(
        short,
        long,
        env,
        default_value_t = StreamMode::Broadcast,
        value_parser = clap::builder::PossibleValuesParser::new([
            "BROADCAST", "SESSION",
            "broadcast", "session"
        ])
            .map(|s| s.parse::<StreamMode>().unwrap()),
    )]
    pub stream_mode: StreamMode,

    /// Interval in seconds between SSE keep-alive comments on idle connections
    #[arg(long, env, default_value_t = 15)]
    pub sse_keep_alive_secs: u64,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: String,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// The socket address string the server should bind to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.interface, self.port)
    }
}
