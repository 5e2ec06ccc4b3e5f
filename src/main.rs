use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use bloom_companion::voice::{
    AudioPayload, AudioPlayback, AudioSink, MicCapture, SpeechCapture, WhisperRecognizer,
    samples_to_wav,
};
use bloom_companion::{
    CaptureError, Config, HttpGateway, InferenceGateway, SessionController, SessionOptions,
    SessionState, Speaker,
};

/// Bloom - voice conversation companion
#[derive(Parser)]
#[command(name = "bloom", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (text-only session)
    #[arg(long, env = "BLOOM_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,bloom_companion=info",
        1 => "info,bloom_companion=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let config = Config::load_with_options(cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    let gateway = HttpGateway::from_config(&config.gateway);
    let options = SessionOptions {
        voice: config.voice.voice.clone(),
        speech_enabled: config.voice.enabled,
        user_context: config.context.clone(),
    };

    if config.voice.enabled {
        let recognizer = Arc::new(WhisperRecognizer::new(
            config.gateway.base_url.clone(),
            config.gateway.api_key.clone(),
            config.gateway.stt_model.clone(),
        ));
        let capture = MicCapture::new(recognizer);
        let playback = AudioPlayback::new()?;
        let controller = SessionController::new(gateway, capture, playback, options);
        session_loop(controller).await
    } else {
        let controller =
            SessionController::new(gateway, DisabledCapture, DisabledSink, options);
        session_loop(controller).await
    }
}

/// Capture adapter used when voice is disabled
struct DisabledCapture;

#[async_trait(?Send)]
impl SpeechCapture for DisabledCapture {
    async fn start(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::NoDevice)
    }

    async fn stop(&mut self) -> String {
        String::new()
    }

    fn partial_transcript(&self) -> String {
        String::new()
    }

    fn is_active(&self) -> bool {
        false
    }
}

/// Playback adapter used when voice is disabled
struct DisabledSink;

#[async_trait(?Send)]
impl AudioSink for DisabledSink {
    async fn play(&mut self, _wav: &[u8]) -> bloom_companion::Result<()> {
        Ok(())
    }
}

/// Interactive terminal session
async fn session_loop<G, C, P>(mut controller: SessionController<G, C, P>) -> anyhow::Result<()>
where
    G: InferenceGateway,
    C: SpeechCapture,
    P: AudioSink,
{
    println!("Bloom is ready. Type a message; :mic toggles voice input, :quit exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Option<String> = None;

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();

        match line.as_str() {
            ":quit" | ":q" => break,
            ":mic" => {
                if controller.state() == SessionState::Listening {
                    let transcript = controller.stop_capture().await;
                    if transcript.is_empty() {
                        println!("(no speech detected)");
                    } else {
                        println!(
                            "captured: \"{transcript}\" - press Enter to send, or type something else"
                        );
                        pending = Some(transcript);
                    }
                } else {
                    match controller.start_capture().await {
                        Ok(()) => println!("listening... type :mic again to stop"),
                        Err(e) => eprintln!("could not start capture: {e}"),
                    }
                }
            }
            "" => {
                if let Some(text) = pending.take() {
                    submit(&mut controller, &text).await;
                }
            }
            text => {
                pending = None;
                submit(&mut controller, text).await;
            }
        }
    }

    Ok(())
}

/// Submit one utterance and print the companion's reply
async fn submit<G, C, P>(controller: &mut SessionController<G, C, P>, text: &str)
where
    G: InferenceGateway,
    C: SpeechCapture,
    P: AudioSink,
{
    let before = controller.history().len();
    match controller.submit_utterance(text).await {
        Ok(()) => {
            if controller.history().len() == before {
                println!("(finish voice input with :mic before sending)");
                return;
            }
            if let Some(turn) = controller.history().last() {
                if turn.speaker == Speaker::Agent {
                    println!("bloom: {}", turn.text);
                }
            }
        }
        Err(e) => eprintln!("{e}"),
    }
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let config = Config::load()?;
    let recognizer = Arc::new(WhisperRecognizer::new(
        config.gateway.base_url.clone(),
        config.gateway.api_key.clone(),
        config.gateway.stt_model.clone(),
    ));
    let mut capture = MicCapture::new(recognizer);
    capture.start().await?;

    println!("Sample rate: {} Hz", bloom_companion::voice::CAPTURE_SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_samples();
        let energy = calculate_rms(&samples);
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
        capture.clear_samples();
    }

    capture.cancel();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24_000u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    let wav = samples_to_wav(&samples, sample_rate)?;
    println!("Playing {} samples at {sample_rate} Hz...", samples.len());

    let mut playback = AudioPlayback::new()?;
    playback.play(&wav).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test TTS output via the gateway
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let gateway = HttpGateway::from_config(&config.gateway);

    println!("Synthesizing speech...");
    let speech = gateway.synthesize_speech(text, &config.voice.voice).await?;
    println!(
        "Got {} bytes of PCM at {} Hz",
        speech.pcm.len(),
        speech.sample_rate_hz
    );

    let wav = AudioPayload::mono16(speech.pcm, speech.sample_rate_hz).frame()?;

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play(&wav).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
