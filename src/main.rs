use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use sysinfo::System;

use native_audio::{
    AppResult, AudioSystemManager, EngineConfig, Event, LoadOptions, PlayOptions, RodioBackend,
};

const LOG_TARGET_STARTUP: &str = "native_audio::startup";
const ASSET_ID: &str = "demo";

const USAGE: &str =
    "usage: native-audio-demo <file> [--volume V] [--fade-in S] [--fade-out S] [--loop]";

#[derive(Debug, Default)]
struct DemoArgs {
    file: String,
    volume: Option<f32>,
    fade_in: Option<f64>,
    fade_out: Option<f64>,
    looping: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> AppResult<DemoArgs> {
    let mut parsed = DemoArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--volume" => parsed.volume = Some(flag_value(&arg, args.next())?),
            "--fade-in" => parsed.fade_in = Some(flag_value(&arg, args.next())?),
            "--fade-out" => parsed.fade_out = Some(flag_value(&arg, args.next())?),
            "--loop" => parsed.looping = true,
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
            _ if parsed.file.is_empty() => parsed.file = arg,
            _ => bail!("unexpected argument {}\n{}", arg, USAGE),
        }
    }

    if parsed.file.is_empty() {
        bail!(USAGE);
    }
    Ok(parsed)
}

fn flag_value<T>(flag: &str, value: Option<String>) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = value.ok_or_else(|| anyhow!("{} needs a value", flag))?;
    value
        .parse()
        .with_context(|| format!("invalid value for {}: {}", flag, value))
}

/// Initialize tracing with file rotation
///
/// Logs are written to `<config dir>/NativeAudio/logs/native-audio.YYYY-MM-DD.log`.
/// Debug builds also log to the console.
fn initialize_tracing(config: &EngineConfig) {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = EngineConfig::config_dir()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(|_| std::path::PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "native-audio.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Logging initialized, writing to {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting native-audio demo v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
}

fn main() -> AppResult<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = EngineConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: using default config: {}", e);
        EngineConfig::default()
    });

    initialize_tracing(&config);
    log_runtime_environment();

    let backend = RodioBackend::new().context("failed to open audio output")?;
    let manager = AudioSystemManager::with_threads(Arc::new(backend), config)
        .context("failed to start audio runtime")?;
    let (events, _subscriber) = manager.subscribe();

    let mut load = LoadOptions::new();
    if let Some(volume) = args.volume {
        load = load.with_volume(volume);
    }
    manager
        .load(ASSET_ID, &args.file, load)
        .with_context(|| format!("failed to load {}", args.file))?;

    if args.looping {
        manager.loop_playback(ASSET_ID)?;
        println!("Looping {} (Ctrl+C to quit)", args.file);
    } else {
        let mut play = PlayOptions::new();
        if let Some(seconds) = args.fade_in {
            play = play.with_fade_in(seconds);
        }
        if let Some(seconds) = args.fade_out {
            play = play.with_fade_out(seconds);
        }
        manager.play(ASSET_ID, play)?;
        println!("Playing {}", args.file);
    }

    loop {
        match events.recv_timeout(Duration::from_secs(1)) {
            Ok(Event::PositionUpdate { seconds, .. }) => print!("\r  {:>7.1}s", seconds),
            Ok(Event::DurationAvailable { seconds, .. }) => println!("\nDuration: {:.1}s", seconds),
            Ok(Event::Completed { .. }) => {
                println!("\nCompleted");
                break;
            }
            Ok(Event::BackendError { message, .. }) => bail!("playback failed: {}", message),
            Ok(_) => {}
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    manager.unload(ASSET_ID)?;
    tracing::info!("Demo finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_full_command_line() {
        let parsed = parse_args(args(&[
            "song.mp3", "--volume", "0.5", "--fade-in", "1.5", "--fade-out", "2", "--loop",
        ]))
        .unwrap();
        assert_eq!(parsed.file, "song.mp3");
        assert_eq!(parsed.volume, Some(0.5));
        assert_eq!(parsed.fade_in, Some(1.5));
        assert_eq!(parsed.fade_out, Some(2.0));
        assert!(parsed.looping);
    }

    #[test]
    fn test_parse_requires_file() {
        assert!(parse_args(args(&["--loop"])).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(parse_args(args(&["a.mp3", "--volume", "loud"])).is_err());
        assert!(parse_args(args(&["a.mp3", "--volume"])).is_err());
        assert!(parse_args(args(&["a.mp3", "--speed", "2"])).is_err());
        assert!(parse_args(args(&["a.mp3", "b.mp3"])).is_err());
    }
}
