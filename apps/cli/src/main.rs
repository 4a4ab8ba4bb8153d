mod error;
mod runtime;
mod synth;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use duet_assembler::{AssemblyConfig, AssemblyParams, AssemblyReport, spawn_assembler};
use duet_script::parser::{DEFAULT_TAG_A, DEFAULT_TAG_B};
use duet_script::{ScriptParser, segment_script};

use crate::error::{Error, Result};
use crate::runtime::CliRuntime;
use crate::synth::SynthKind;

const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "duet", about = "Assemble a two-speaker script into one podcast track")]
struct Cli {
    #[arg(long, env = "INPUT_FILE", default_value = "podcast_script.md")]
    input_file: PathBuf,

    #[arg(long, env = "OUTPUT_FILE", default_value = "podcast.wav")]
    output_file: PathBuf,

    /// Filter directive, e.g. `info` or `assembler=debug`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "SPEAKER_A_TAG", default_value = DEFAULT_TAG_A)]
    speaker_a: String,

    #[arg(long, env = "SPEAKER_B_TAG", default_value = DEFAULT_TAG_B)]
    speaker_b: String,

    #[arg(long, value_enum, env = "SYNTH", default_value_t = SynthKind::Tone)]
    synth: SynthKind,

    /// Directory of `<segment_index>.wav` files for `--synth clips`.
    #[arg(long, env = "CLIPS_DIR")]
    clips_dir: Option<PathBuf>,

    /// Fixes silence durations and tone timing for reproducible output.
    #[arg(long, env = "SEED")]
    seed: Option<u64>,
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| "info".into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(report) => {
            eprintln!(
                "Wrote {} ({:.1}s, {} segments, {} skipped)",
                report.output_path.display(),
                report.duration_secs,
                report.segments_appended,
                report.segments_skipped,
            );
        }
        Err(error) => {
            tracing::error!(%error, "duet_failed");
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<AssemblyReport> {
    let config = AssemblyConfig::from_env()?;

    let parser = ScriptParser::new(&cli.speaker_a, &cli.speaker_b)?;
    let utterances = parser
        .parse_file(&cli.input_file)
        .map_err(|source| Error::Script {
            path: cli.input_file.clone(),
            source,
        })?;
    let segments = segment_script(&utterances, config.max_length(), &config.boundary_marks());

    let synth = synth::Synth::from_args(
        cli.synth,
        cli.clips_dir.clone(),
        config.tts_chars_per_second,
        cli.seed,
    )?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let (runtime, lanes, mut events) = CliRuntime::new();

    let assembly = spawn_assembler(AssemblyParams {
        runtime: Arc::new(runtime),
        session_id,
        segments,
        config,
        output_path: cli.output_file,
        seed: cli.seed,
    })
    .await?;
    let handle = assembly.handle();

    let producers = synth.spawn_lanes(lanes, handle.clone());

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("{}", serde_json::to_string(&event).unwrap_or_default());
        }
    });

    let interrupt = tokio::spawn({
        let handle = handle.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt_received");
                handle.stop();
            }
        }
    });

    let result = assembly.wait().await;

    interrupt.abort();
    for producer in producers {
        producer.abort();
    }
    let _ = tokio::time::timeout(EVENT_DRAIN_TIMEOUT, printer).await;

    Ok(result?)
}
