use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dyad_session::api::{FixedTimezone, SessionTopicInfo, SystemTimezone, TimezoneProvider};
use dyad_session::session::Recommendation;
use dyad_session::{
    ApiClient, AutoConfirm, Config, DialogueRole, DialogueTurn, RecordingController, SessionApi,
    SessionDriver, SessionError, StopOutcome, TurnObserver, UploadPipeline, WavDeviceFactory,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dyad-session", version, about = "Turn-based dyad dialogue session client")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/dyad-session")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a WAV file as one parent turn and upload it
    Submit {
        #[arg(long)]
        session_id: String,
        #[arg(long)]
        turn_id: String,
        /// 16-bit PCM WAV used as the microphone
        #[arg(long)]
        input: PathBuf,
        /// Seconds to record; defaults to the input's length
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// Run a scripted session against the backend
    Dialogue {
        /// 16-bit PCM WAV used as the microphone for parent turns
        #[arg(long)]
        input: PathBuf,
        /// Topic category
        #[arg(long, default_value = "free")]
        topic: String,
        /// Number of turns to play before requesting termination
        #[arg(long, default_value_t = 4)]
        turns: u32,
        /// Seconds recorded per parent turn
        #[arg(long, default_value_t = 3.0)]
        seconds: f64,
        /// Confirm termination when asked
        #[arg(long)]
        yes: bool,
    },
}

/// Logs turn events the way the app would toast them
struct LogObserver;

impl TurnObserver for LogObserver {
    fn on_go_next(&mut self, role: DialogueRole) {
        info!("{:?} turn handed over", role);
    }

    fn on_go_next_fail(&mut self, role: DialogueRole, reason: &SessionError) {
        warn!("{:?} turn blocked: {} [{}]", role, reason, reason.message_key());
    }

    fn on_warning(&mut self, warning: &SessionError) {
        warn!("{} [{}]", warning, warning.message_key());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!("Loaded config: {}", cfg.service.name);

    let timezone: Arc<dyn TimezoneProvider> = match &cfg.backend.timezone {
        Some(tz) => Arc::new(FixedTimezone(tz.clone())),
        None => Arc::new(SystemTimezone),
    };
    let mut client = ApiClient::new(
        &cfg.backend.resolve_address(),
        timezone,
        cfg.backend.request_timeout(),
    )?;
    if let Some(token) = &cfg.backend.token {
        client = client.with_token(token.clone());
    }
    let api: Arc<dyn SessionApi> = Arc::new(client);

    match cli.command {
        Command::Submit {
            session_id,
            turn_id,
            input,
            seconds,
        } => {
            let factory = WavDeviceFactory::open(&input)?;
            let seconds = seconds.unwrap_or_else(|| factory.duration_seconds());
            let recorder = RecordingController::new(
                Arc::new(factory),
                UploadPipeline::new(Arc::clone(&api)),
                cfg.recording.settings(),
            );

            let turn = DialogueTurn::new(session_id, turn_id, DialogueRole::Parent);
            recorder.start(&turn, None).await?;
            tokio::time::sleep(Duration::from_secs_f64(seconds)).await;

            match recorder.stop(false).await? {
                StopOutcome::Submitted(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                other => warn!("Nothing submitted: {:?}", other),
            }
        }
        Command::Dialogue {
            input,
            topic,
            turns,
            seconds,
            yes,
        } => {
            let recorder = RecordingController::new(
                Arc::new(WavDeviceFactory::open(&input)?),
                UploadPipeline::new(Arc::clone(&api)),
                cfg.recording.settings(),
            );
            let topic = SessionTopicInfo {
                category: topic,
                subtopic: None,
                subdescription: None,
            };

            let mut driver = SessionDriver::open(api, recorder, topic)
                .await
                .context("Failed to open session")?;
            let mut observer = LogObserver;

            for _ in 0..turns {
                match driver.session().current_role() {
                    DialogueRole::Parent => {
                        driver.start_recording(None).await?;
                        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                    }
                    DialogueRole::Child => {
                        let first_card = match driver.session().recommendation() {
                            Some(Recommendation::ChildCards(rec)) => {
                                rec.cards.first().map(|c| c.identity())
                            }
                            _ => None,
                        };
                        match first_card {
                            Some(card) => driver.select_card(&card).await?,
                            None => warn!("No card recommendations for the child turn"),
                        }
                    }
                }

                if !driver.advance(&mut observer).await?.is_advanced() {
                    break;
                }
            }

            let outcome = driver.request_termination(&AutoConfirm(yes)).await?;
            info!("Termination outcome: {:?}", outcome);
            println!("{}", serde_json::to_string_pretty(&driver.stats())?);
        }
    }

    Ok(())
}
