use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the davwatch server.
#[derive(Parser, Debug)]
#[clap(name = "davwatch")]
#[clap(about = "Change detection service for remote WebDAV trees", long_about = None)]
pub struct Args {
    /// Path to the JSON configuration file
    #[clap(short, long, value_name = "FILE", default_value = "config.json")]
    pub config: PathBuf,

    /// Port to listen on (falls back to the PORT environment variable, then 8080)
    #[clap(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    pub host: String,
}
