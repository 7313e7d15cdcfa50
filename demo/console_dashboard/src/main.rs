mod config;
mod input;
mod render;

use config::ConsoleConfig;
use input::{parse_line, Input, HELP};
use render::{describe, ConsoleRenderer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use vigil_audio::{AlarmPlayer, Playback};
use vigil_core::telemetry::init_tracing;
use vigil_core::{Session, UserCommand};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    // Logging / tracing to stderr; stdout is the dashboard
    init_tracing("info,vigil_core=info,vigil_audio=info,console_dashboard=info")?;

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = ConsoleConfig::load();
    info!(
        target: "console",
        base_url = %cfg.sync.base_url,
        sse = %cfg.sync.sse_url(),
        streams = ?cfg.sync.features.response_streams,
        "Starting console dashboard"
    );

    if let Err(e) = AlarmPlayer::check(&cfg.alarm) {
        warn!(target: "console", error = %e, "Alarm sound unavailable");
    }
    let alarm = AlarmPlayer::new(cfg.alarm.clone());
    if cfg.sync.features.sound_alarm && *alarm.playback() == Playback::Silent {
        warn!(target: "console", "Alarm enabled but no sound output is configured");
    }

    let renderer = ConsoleRenderer::new(
        cfg.sync.features.threat_stream.clone(),
        cfg.display.frame_out.clone(),
    );
    let view = renderer.shared_view();
    let threat_stream = cfg.sync.features.threat_stream.clone();

    let (session, handle) = Session::new(cfg.sync.clone(), renderer, alarm)?;
    let session_task = tokio::spawn(session.run());

    if !cfg.display.show_annotated {
        handle.send(UserCommand::ShowAnnotated(false)).await?;
    }
    if cfg.display.arm_alarm {
        handle.send(UserCommand::ArmAlarm(true)).await?;
    }

    println!("{HELP}");

    // Console commands → session
    let input_handle = handle.clone();
    let input_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!(target: "console", error = %e, "Failed to read stdin");
                    break;
                }
            };
            match parse_line(&line) {
                Ok(None) => {}
                Ok(Some(Input::Help)) => println!("{HELP}"),
                Ok(Some(Input::Status)) => {
                    let current = view.lock().ok().and_then(|guard| guard.as_ref().cloned());
                    match current {
                        Some(state) => println!("{}", describe(&state, &threat_stream)),
                        None => println!("no data yet"),
                    }
                }
                Ok(Some(Input::Command(command))) => {
                    let quit = command == UserCommand::Shutdown;
                    if input_handle.send(command).await.is_err() || quit {
                        break;
                    }
                }
                Err(msg) => println!("{msg}"),
            }
        }
    });

    // Ctrl+C handler to shutdown gracefully
    tokio::select! {
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                error!(target: "console", error = %e, "Failed to listen for Ctrl+C");
            }
            info!(target: "console", "Shutting down...");
            handle.shutdown().await.ok();
        }
        _ = input_task => {
            // stdin closed or quit typed
            handle.shutdown().await.ok();
        }
    }

    let sync = session_task.await?;
    info!(
        target: "console",
        stats = ?sync.stats(),
        alarms = sync.alarm().plays(),
        "Dashboard stopped"
    );
    Ok(())
}
