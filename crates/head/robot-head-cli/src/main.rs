//! `robot-head`: drive the head from the command line.
//!
//! ```bash
//! robot-head play fixtures/sequences/demo.json
//! robot-head --serial /dev/ttyUSB0 --baud 9600 speak "hello there"
//! robot-head map fixtures/blendshapes/blink.json
//! ```
//!
//! Without `--serial` (or a serial transport in `--config`) every command is
//! only logged. Ctrl-C stops playback and releases the transport.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use robot_head_core::sequence::load_sequence_file;
use robot_head_core::{
    open_transport, ActuatorState, BlendshapeInput, BlendshapeMapper, ExpressionFrame,
    ExpressionSequence, HeadConfig, PlaybackReport, SequencePlayer, StopSignal, TransportConfig,
    VoiceRoutine,
};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "robot-head")]
#[command(about = "Translate expressions into robot head commands and play them back")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// JSON configuration file
    #[arg(long, global = true, env = "ROBOT_HEAD_CONFIG")]
    config: Option<PathBuf>,

    /// Serial device to write commands to (overrides the configured transport)
    #[arg(long, global = true, env = "ROBOT_HEAD_SERIAL")]
    serial: Option<PathBuf>,

    /// Baud rate for --serial
    #[arg(long, global = true, default_value_t = 9600)]
    baud: u32,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a prediction JSON or expression CSV file
    Play {
        file: PathBuf,
        /// Delay for frames without their own duration, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Map blendshape sample(s) to head poses
    Map {
        /// JSON object, or array of objects, of blendshape weights
        file: PathBuf,
        /// Also play the mapped poses on the head
        #[arg(long)]
        play: bool,
    },
    /// Play the built-in expression demo
    Demo,
    /// Run a listening / thinking / speaking turn for the given reply
    Speak { text: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Samples {
    One(BlendshapeInput),
    Many(Vec<BlendshapeInput>),
}

impl Samples {
    fn into_vec(self) -> Vec<BlendshapeInput> {
        match self {
            Samples::One(s) => vec![s],
            Samples::Many(v) => v,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let cfg = resolve_config(&cli.global)?;
    match cli.command {
        Command::Play { file, delay_ms } => {
            let delay = delay_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| cfg.playback.default_frame_delay());
            let seq = load_sequence_file(&file, delay)
                .with_context(|| format!("loading {}", file.display()))?;
            info!("loaded {} frames from {}", seq.len(), file.display());
            play(&cfg, &seq).await
        }
        Command::Map { file, play: also_play } => {
            let samples = read_samples(&file)?;
            let mapper = BlendshapeMapper::new(cfg.mapper.clone());
            for sample in &samples {
                println!("{}", serde_json::to_string(&mapper.map(sample))?);
            }
            if also_play {
                let seq = ExpressionSequence::from_blendshapes(
                    &samples,
                    mapper.config(),
                    cfg.playback.default_frame_delay(),
                );
                play(&cfg, &seq).await?;
            }
            Ok(())
        }
        Command::Demo => play(&cfg, &demo_sequence()).await,
        Command::Speak { text } => {
            let seq = VoiceRoutine::new(cfg.speech.clone()).interaction(&text);
            play(&cfg, &seq).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Defaults, then the config file, then command-line overrides.
fn resolve_config(args: &GlobalArgs) -> Result<HeadConfig> {
    let mut cfg = match &args.config {
        Some(path) => HeadConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HeadConfig::default(),
    };
    if let Some(path) = &args.serial {
        cfg.transport = TransportConfig::Serial {
            path: path.clone(),
            baud: args.baud,
        };
    }
    Ok(cfg)
}

fn read_samples(path: &Path) -> Result<Vec<BlendshapeInput>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let samples: Samples = serde_json::from_str(&text)
        .with_context(|| format!("parsing blendshapes in {}", path.display()))?;
    Ok(samples.into_vec())
}

async fn play(cfg: &HeadConfig, seq: &ExpressionSequence) -> Result<()> {
    let transport = open_transport(&cfg.transport).context("opening transport")?;
    let mut player = SequencePlayer::new(ActuatorState::new(transport));

    let (handle, signal) = StopSignal::pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping playback");
            handle.stop();
        }
    });

    let report = player.play_until(seq, signal).await;
    interrupt.abort();
    print_report(&report)
}

fn print_report(report: &PlaybackReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// A short expressive routine: rest, talk, surprise, blink, rest.
fn demo_sequence() -> ExpressionSequence {
    let ms = Duration::from_millis;
    ExpressionSequence::new(vec![
        ExpressionFrame::new("rest", 1, 11, 1, ms(500)),
        ExpressionFrame::new("talk", 3, 11, 1, ms(300)),
        ExpressionFrame::new("talk", 4, 11, 1, ms(300)),
        ExpressionFrame::new("surprise", 5, 3, 4, ms(600)),
        ExpressionFrame::new("blink", 1, 11, 3, ms(1000)),
        ExpressionFrame::new("rest", 1, 11, 1, ms(500)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serial_flag_overrides_configured_transport() {
        let cli = Cli::parse_from([
            "robot-head",
            "--serial",
            "/dev/ttyUSB0",
            "--baud",
            "115200",
            "demo",
        ]);
        let cfg = resolve_config(&cli.global).unwrap();
        assert_eq!(
            cfg.transport,
            TransportConfig::Serial {
                path: PathBuf::from("/dev/ttyUSB0"),
                baud: 115200
            }
        );
    }

    #[test]
    fn defaults_to_simulated_transport() {
        let cfg = resolve_config(&GlobalArgs::default()).unwrap();
        assert_eq!(cfg.transport, TransportConfig::default());
    }

    #[test]
    fn reads_single_and_batched_samples() {
        let one = robot_head_test_fixtures::blendshapes::path("blink").unwrap();
        assert_eq!(read_samples(&one).unwrap().len(), 1);

        let many: Samples = serde_json::from_str(r#"[{"jawOpen": 0.5}, {}]"#).unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn demo_holds_for_three_point_two_seconds() {
        let seq = demo_sequence();
        assert_eq!(seq.len(), 6);
        assert_eq!(seq.total_duration(), Duration::from_millis(3200));
    }

    #[tokio::test(start_paused = true)]
    async fn demo_plays_on_the_simulated_head() {
        play(&HeadConfig::default(), &demo_sequence()).await.unwrap();
    }
}
