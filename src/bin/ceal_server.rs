//! CEAL API Server binary
//!
//! HTTP REST API for the annual survey: forms, subscription lists and the
//! year-end export.

use std::path::PathBuf;

use ceal_stats::api::{run_api_server, ApiConfig};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ceal-server")]
#[command(version)]
#[command(about = "CEAL API Server - HTTP REST API for the annual statistics survey")]
#[command(long_about = r#"
CEAL API Server - HTTP REST API

Survey endpoints:
  - GET  /api/export/year-end-reports?year=&formType=  - Year-end .xlsx
  - GET  /api/forms/:formType    - Load a form or its carry-forward prefill
  - POST /api/forms/:formType    - Save a draft or submit
  - /api/av, /api/ebook, /api/ejournal - List, create, update, delete,
    subscribe and unsubscribe
  - /api/libraries, /api/library-years - Administration

Additional endpoints:
  - GET  /health                 - Health check
  - GET  /version                - Server version info
  - GET  /                       - API documentation

Requests are authorized from the uinf, role and library cookies.

Example usage:
  ceal-server                              # In-memory, localhost:8080
  ceal-server --data ceal.json --port 3000 # Persist to a snapshot file
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "CEAL_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "CEAL_PORT")]
    port: u16,

    /// Snapshot file loaded at startup and saved after every change
    #[arg(short, long, env = "CEAL_DATA")]
    data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        data_path: args.data,
    };

    run_api_server(config).await
}
