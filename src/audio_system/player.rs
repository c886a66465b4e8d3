/// Rodio media backend
///
/// Plays local files through the default output device. Each player keeps
/// the encoded file in memory and builds a fresh decoder and sink per play,
/// so channels of the same asset never share decoder state.
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::backend::{MediaBackend, MediaPlayer, SignalSink};
use super::source::{AssetSource, SourceKind};
use crate::error::{AudioError, AudioResult};

/// Backend over the default rodio output stream.
///
/// `OutputStream` must stay on the thread that created it, so a dedicated
/// "audio-output" thread owns it until the backend is dropped.
pub struct RodioBackend {
    output: OutputStreamHandle,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RodioBackend {
    pub fn new() -> AudioResult<Self> {
        let (ready_tx, ready_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((_stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    // Keeps the stream alive until the sender is dropped
                    let _ = shutdown_rx.recv();
                    tracing::debug!("Audio output thread exiting");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(AudioError::backend_with_source(
                        "no audio output device available",
                        e,
                    )));
                }
            })
            .map_err(|e| AudioError::backend_with_source("failed to spawn audio output thread", e))?;

        let output = ready_rx
            .recv()
            .map_err(|_| AudioError::backend("audio output thread exited during startup"))??;

        tracing::info!("Audio output stream initialized");
        Ok(Self {
            output,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

impl MediaBackend for RodioBackend {
    fn open(&self, source: &AssetSource, _signals: SignalSink) -> AudioResult<Box<dyn MediaPlayer>> {
        let path = resolve_local_path(source)?;
        let data = std::fs::read(&path)
            .map_err(|e| AudioError::invalid_source(source.reference(), e.to_string()))?;

        // Reject undecodable data at open time rather than on first play
        let decoder = Decoder::new(Cursor::new(data.clone()))
            .map_err(|e| AudioError::invalid_source(source.reference(), e.to_string()))?;
        let duration = probe_duration(&data, &path)
            .or_else(|| decoder.total_duration().map(|d| d.as_secs_f64()));

        tracing::debug!(
            "Opened {} ({} bytes, duration {:?})",
            path.display(),
            data.len(),
            duration
        );

        Ok(Box::new(RodioPlayer {
            reference: source.reference().to_string(),
            data: Arc::new(data),
            output: self.output.clone(),
            sink: None,
            volume: 1.0,
            speed: 1.0,
            duration,
            released: false,
        }))
    }

    fn name(&self) -> &str {
        "rodio"
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Local file path of `source`; streams and remote URLs are not playable
/// through rodio
pub fn resolve_local_path(source: &AssetSource) -> AudioResult<PathBuf> {
    if source.kind() == SourceKind::Stream {
        return Err(AudioError::invalid_source(
            source.reference(),
            "streaming playlists are not supported by the rodio backend",
        ));
    }
    let path = source.local_path().ok_or_else(|| {
        AudioError::invalid_source(
            source.reference(),
            "remote files are not supported by the rodio backend",
        )
    })?;
    if !path.exists() {
        return Err(AudioError::invalid_source(source.reference(), "file does not exist"));
    }
    Ok(path)
}

/// Seek position as a `Duration`; negative times clamp to the start
fn seek_target(reference: &str, seconds: f64) -> AudioResult<Duration> {
    Duration::try_from_secs_f64(seconds.max(0.0)).map_err(|_| {
        AudioError::InvalidArgument(format!("cannot seek {} to {}s", reference, seconds))
    })
}

/// Duration from the container headers, when they carry a frame count
fn probe_duration(data: &[u8], path: &Path) -> Option<f64> {
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::probe::Hint;

    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &Default::default(), &Default::default())
        .ok()?;
    let track = probed.format.default_track()?;
    let n_frames = track.codec_params.n_frames?;
    let sample_rate = track.codec_params.sample_rate?;

    Some(n_frames as f64 / sample_rate as f64)
}

/// One rodio sink over in-memory file data
pub struct RodioPlayer {
    reference: String,
    data: Arc<Vec<u8>>,
    output: OutputStreamHandle,
    sink: Option<Sink>,
    volume: f32,
    speed: f32,
    duration: Option<f64>,
    released: bool,
}

impl RodioPlayer {
    fn ensure_open(&self) -> AudioResult<()> {
        if self.released {
            return Err(AudioError::backend(format!("{} was released", self.reference)));
        }
        Ok(())
    }

    fn start(&mut self, at_seconds: f64, looping: bool) -> AudioResult<()> {
        self.ensure_open()?;
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }

        let sink = Sink::try_new(&self.output)
            .map_err(|e| AudioError::backend_with_source("failed to create sink", e))?;
        sink.set_volume(self.volume);
        sink.set_speed(self.speed);

        let decoder = Decoder::new(Cursor::new(self.data.as_ref().clone()))
            .map_err(|e| AudioError::invalid_source(&self.reference, e.to_string()))?;
        if looping {
            sink.append(decoder.repeat_infinite());
        } else {
            sink.append(decoder);
        }

        if at_seconds > 0.0 {
            sink.try_seek(seek_target(&self.reference, at_seconds)?)
                .map_err(|e| AudioError::backend(format!("seek in {} failed: {}", self.reference, e)))?;
        }
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }
}

impl MediaPlayer for RodioPlayer {
    fn play(&mut self, at_seconds: f64) -> AudioResult<()> {
        self.start(at_seconds, false)
    }

    fn play_looping(&mut self) -> AudioResult<()> {
        self.start(0.0, true)
    }

    fn pause(&mut self) -> AudioResult<()> {
        self.ensure_open()?;
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        Ok(())
    }

    fn resume(&mut self) -> AudioResult<()> {
        self.ensure_open()?;
        if let Some(sink) = &self.sink {
            sink.play();
        }
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        self.ensure_open()?;
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> AudioResult<()> {
        self.ensure_open()?;
        match &self.sink {
            Some(sink) => sink
                .try_seek(seek_target(&self.reference, seconds)?)
                .map_err(|e| AudioError::backend(format!("seek in {} failed: {}", self.reference, e))),
            None => Ok(()),
        }
    }

    fn set_volume(&mut self, volume: f32) -> AudioResult<()> {
        self.ensure_open()?;
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> AudioResult<()> {
        self.ensure_open()?;
        self.speed = rate;
        if let Some(sink) = &self.sink {
            sink.set_speed(rate);
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        !self.released
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.is_paused() && !sink.empty())
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn position(&self) -> Option<f64> {
        if self.released {
            return None;
        }
        Some(self.sink.as_ref().map_or(0.0, |sink| sink.get_pos().as_secs_f64()))
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Playback itself needs an output device; only path handling is tested here

    #[test]
    fn test_stream_is_rejected() {
        let source = AssetSource::classify("https://example.com/live.m3u8", true).unwrap();
        assert!(matches!(
            resolve_local_path(&source),
            Err(AudioError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_remote_file_is_rejected() {
        let source = AssetSource::classify("https://example.com/clip.mp3", true).unwrap();
        assert!(matches!(
            resolve_local_path(&source),
            Err(AudioError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let source = AssetSource::file("definitely/not/here.mp3").unwrap();
        assert!(matches!(
            resolve_local_path(&source),
            Err(AudioError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_seek_target_rejects_out_of_range() {
        assert_eq!(seek_target("a", -1.0).unwrap(), Duration::ZERO);
        assert_eq!(seek_target("a", 1.5).unwrap(), Duration::from_millis(1500));
        assert!(matches!(
            seek_target("a", 1e20),
            Err(AudioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_file_url_resolves() {
        let dir = std::env::temp_dir();
        let path = dir.join("native_audio_resolve_test.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let reference = format!("file://{}", path.display());
        let source = AssetSource::classify(&reference, true).unwrap();
        assert_eq!(resolve_local_path(&source).unwrap(), path);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_probe_duration_of_garbage() {
        assert_eq!(probe_duration(b"not audio", Path::new("x.mp3")), None);
    }
}
