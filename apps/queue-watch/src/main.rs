use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod render;

use auth_cell::{FileTokenStore, IdentityProvider};
use cli::{Cli, Command};
use doctor_cell::DoctorQueueView;
use patient_cell::PatientQueueView;
use queue_sync_cell::{QueueContext, StompConnector, ViewChange};
use shared_config::AppConfig;
use shared_models::AppError;

#[tokio::main]
async fn main() -> Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.apply(AppConfig::from_env());

    let identity = Arc::new(IdentityProvider::new(Arc::new(FileTokenStore::from_config(&config))));

    match cli.command {
        Command::Login { token } => {
            let session = identity.sign_in(&token)?;
            println!("Signed in as {} ({})", session.identity.subject, session.role());
        }
        Command::Logout => {
            identity.sign_out()?;
            println!("Signed out");
        }
        Command::Patient { appointment_id } => {
            let ctx = context(&config, Arc::clone(&identity));
            let _watcher = identity.spawn_store_watcher(config.token_poll_interval);
            run_patient(&ctx, identity, appointment_id).await?;
        }
        Command::Doctor { doctor_id, schedule, complete } => {
            let ctx = context(&config, Arc::clone(&identity));
            let _watcher = identity.spawn_store_watcher(config.token_poll_interval);
            run_doctor(&ctx, identity, doctor_id, schedule, complete).await?;
        }
    }

    Ok(())
}

fn context(config: &AppConfig, identity: Arc<IdentityProvider>) -> QueueContext {
    let connector = StompConnector::new(config).with_identity(identity);
    QueueContext::with_connector(config, Arc::new(connector))
}

/// Print the sign-in hint for a redirect; anything else is a real failure.
fn redirect_or_fail(err: AppError) -> Result<()> {
    match err {
        AppError::AuthRequired { sign_in_route } => {
            println!("Not signed in. Sign in at {} and run `queue-watch login <token>`.", sign_in_route);
            Ok(())
        }
        other => Err(other.into()),
    }
}

async fn run_patient(ctx: &QueueContext, identity: Arc<IdentityProvider>, appointment_id: i64) -> Result<()> {
    let mut view = match PatientQueueView::mount(ctx, identity, appointment_id).await {
        Ok(view) => view,
        Err(e) => return redirect_or_fail(e),
    };
    println!("{}", render::patient(&view.snapshot()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing queue view");
                view.unmount().await;
                break;
            }
            change = view.next_change() => match change {
                Some(ViewChange::Updated(snapshot)) => println!("{}", render::patient(&snapshot)),
                Some(ViewChange::SignedOut { sign_in_route }) => {
                    println!("Signed out. Sign in again at {}.", sign_in_route);
                    break;
                }
                None => break,
            },
        }
    }
    Ok(())
}

async fn run_doctor(
    ctx: &QueueContext,
    identity: Arc<IdentityProvider>,
    doctor_id: i64,
    schedule: Option<i64>,
    complete_once: bool,
) -> Result<()> {
    let mut view = match DoctorQueueView::mount(ctx, identity, doctor_id).await {
        Ok(view) => view,
        Err(e) => return redirect_or_fail(e),
    };

    let mounted = view.snapshot();
    for schedule in &mounted.schedules {
        println!("  schedule {}: {}", schedule.schedule_id, schedule.label());
    }
    let Some(schedule_id) = schedule.or_else(|| mounted.schedules.first().map(|s| s.schedule_id)) else {
        println!("Doctor {} has no schedules.", doctor_id);
        return Ok(());
    };

    let snapshot = view.select_schedule(schedule_id).await?;
    println!("{}", render::doctor(&snapshot));

    if complete_once {
        if let Err(e) = view.complete().await {
            warn!("Completion failed: {}", e);
        }
        println!("{}", render::doctor(&view.snapshot()));
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing queue view");
                view.unmount().await;
                break;
            }
            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    match line.trim() {
                        "d" => view.dismiss_notice(),
                        "" | "c" => {
                            if let Err(e) = view.complete().await {
                                warn!("Completion failed: {}", e);
                            }
                        }
                        other => println!("Unknown input '{}': Enter completes, d dismisses", other),
                    }
                    println!("{}", render::doctor(&view.snapshot()));
                }
                Ok(None) => input_open = false,
                Err(e) => {
                    warn!("Stopped reading input: {}", e);
                    input_open = false;
                }
            },
            change = view.next_change() => match change {
                Some(ViewChange::Updated(snapshot)) => println!("{}", render::doctor(&snapshot)),
                Some(ViewChange::SignedOut { sign_in_route }) => {
                    println!("Signed out. Sign in again at {}.", sign_in_route);
                    break;
                }
                None => break,
            },
        }
    }
    Ok(())
}
