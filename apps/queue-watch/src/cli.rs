use clap::{Parser, Subcommand};

use shared_config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "queue-watch", about = "Follow a clinic queue from the terminal")]
pub struct Cli {
    #[arg(long, env = "QUEUE_BACKEND_URL")]
    pub backend_url: Option<String>,

    #[arg(long, env = "QUEUE_REALTIME_URL")]
    pub realtime_url: Option<String>,

    #[arg(long, env = "QUEUE_TOKEN_PATH")]
    pub token_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch your place in the queue for an appointment.
    Patient { appointment_id: i64 },
    /// Run a doctor's queue. Press Enter to complete the current patient.
    Doctor {
        doctor_id: i64,
        #[arg(long)]
        schedule: Option<i64>,
        /// Complete the current patient once the queue is loaded.
        #[arg(long)]
        complete: bool,
    },
    /// Store a bearer token for later runs.
    Login { token: String },
    Logout,
}

impl Cli {
    /// Command-line values win over the environment-derived config.
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(url) = &self.backend_url {
            config.backend_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = &self.realtime_url {
            config.realtime_url = url.clone();
        }
        if let Some(path) = &self.token_path {
            config.token_path = path.clone();
        }
        config
    }
}
