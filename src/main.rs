use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use voice_light::voice::{
    CpalMicrophone, MicPreference, SpeechToText, calculate_energy, list_input_devices,
    print_devices,
};
use voice_light::{CommandLoop, Config, HttpLight, LightState, run_text_loop, switch_light};

/// voice-light - Switch a smart light by voice
#[derive(Parser)]
#[command(name = "voice-light", version, about)]
struct Cli {
    /// Wake word that must precede "on" or "off"
    #[arg(short, long, env = "WAKE_WORD")]
    wake_word: Option<String>,

    /// Pick the first microphone whose name contains this text
    #[arg(long, env = "MIC_NAME")]
    mic_name: Option<String>,

    /// Pick the microphone at this index (see `list-mics`)
    #[arg(long, env = "MIC_INDEX")]
    mic_index: Option<usize>,

    /// URL requested to switch the light on
    #[arg(long, env = "LIGHT_ON_URL")]
    on_url: Option<String>,

    /// URL requested to switch the light off
    #[arg(long, env = "LIGHT_OFF_URL")]
    off_url: Option<String>,

    /// Minimum milliseconds between two accepted voice commands
    #[arg(long, env = "COOLDOWN_MS")]
    cooldown_ms: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Control the light by typing "on" or "off"
    Text,
    /// List microphones with their indices
    ListMics,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Send a single request to the light
    Light {
        /// Desired state
        state: StateArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StateArg {
    On,
    Off,
}

impl From<StateArg> for LightState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::On => Self::On,
            StateArg::Off => Self::Off,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,voice_light=info",
        1 => "info,voice_light=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));

    // A pending stdin read must not keep the process alive after Ctrl+C
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::Text) => run_text(&config).await,
        Some(Command::ListMics) => list_mics(),
        Some(Command::TestMic { duration }) => test_mic(&config.mic, duration).await,
        Some(Command::Light { state }) => send_once(&config, state.into()).await,
        None => run_voice(&config).await,
    }
}

/// Environment configuration with command-line overrides applied
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::from_env()?;

    if let Some(wake_word) = &cli.wake_word {
        anyhow::ensure!(!wake_word.trim().is_empty(), "wake word must not be empty");
        config.wake_word.clone_from(wake_word);
    }
    if cli.mic_index.is_some() || cli.mic_name.is_some() {
        config.mic = MicPreference::from_parts(cli.mic_index, cli.mic_name.clone());
    }
    if let Some(url) = &cli.on_url {
        config.light.on_url.clone_from(url);
    }
    if let Some(url) = &cli.off_url {
        config.light.off_url.clone_from(url);
    }
    if let Some(ms) = cli.cooldown_ms {
        config.listen.cooldown = Duration::from_millis(ms);
    }

    Ok(config)
}

/// Forward Ctrl+C to the loops
fn shutdown_channel() -> mpsc::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if let Err(e) = shutdown_tx.send(()).await {
                tracing::trace!(error = %e, "shutdown receiver already closed");
            }
        }
    });
    shutdown_rx
}

fn print_banner(title: &str) {
    println!("{}", "=".repeat(50));
    println!("{title}");
}

/// Run the voice loop until interrupted
#[allow(clippy::future_not_send)]
async fn run_voice(config: &Config) -> anyhow::Result<()> {
    let transcriber = SpeechToText::from_config(&config.stt)?;
    let light = HttpLight::new(config.light.clone())?;

    let mic = CpalMicrophone::open(&config.mic)?;
    println!("Using microphone: {}", mic.name());

    print_banner("Voice Light Control");
    println!("Say something with '{}' and 'on' or 'off'", config.wake_word);
    println!("Press Ctrl+C to exit");
    println!("{}", "=".repeat(50));

    let mut shutdown_rx = shutdown_channel();
    let mut command_loop = CommandLoop::new(config, mic, transcriber, light);
    command_loop.run(&mut shutdown_rx).await?;

    Ok(())
}

/// Run the text loop until "quit", end of input, or Ctrl+C
async fn run_text(config: &Config) -> anyhow::Result<()> {
    let light = HttpLight::new(config.light.clone())?;

    print_banner("Light Control (Text Input)");

    let mut shutdown_rx = shutdown_channel();
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_text_loop(stdin, &light, &mut shutdown_rx).await?;

    Ok(())
}

/// Print the input devices
fn list_mics() -> anyhow::Result<()> {
    let names = list_input_devices()?;
    if names.is_empty() {
        anyhow::bail!("no audio input devices found");
    }
    print_devices(&names);
    Ok(())
}

/// Send one light request
async fn send_once(config: &Config, state: LightState) -> anyhow::Result<()> {
    let light = HttpLight::new(config.light.clone())?;
    println!("Requesting {}", light.url_for(state));
    if !switch_light(&light, state).await {
        anyhow::bail!("light did not respond");
    }
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(preference: &MicPreference, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mic = CpalMicrophone::open(preference)?;
    let capture = mic.acquire()?;

    println!("Device: {}", mic.name());
    println!("Sample rate: {} Hz", mic.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        // Clear buffer each second
        capture.clear_buffer();
    }

    drop(capture);

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is the right mic selected? Run: voice-light list-mics");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}
