use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, FromSample, Sample, SampleFormat, SampleRate, SizedSample, StreamConfig,
    SupportedStreamConfig, SupportedStreamConfigRange,
};
use klavir_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use klavir_ports::types::{AudioConfig, AudioOutputDevice, DeviceId, SampleTime};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Scratch size used until the backend reports its real period length.
const DEFAULT_SCRATCH_FRAMES: usize = 8192;
const UNKNOWN_OUTPUT: &str = "Unknown Output";

pub struct CpalAudioOutputPort {
    host: cpal::Host,
}

impl CpalAudioOutputPort {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn enumerate(host: &cpal::Host) -> Result<Vec<(DeviceId, cpal::Device)>, AudioError> {
        let host_id = format!("{:?}", host.id());
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device.name().unwrap_or_else(|_| UNKNOWN_OUTPUT.to_string());
                (device_id(&host_id, index, &name), device)
            })
            .collect())
    }

    fn resolve_device(
        host: &cpal::Host,
        wanted: Option<&DeviceId>,
    ) -> Result<cpal::Device, AudioError> {
        match wanted {
            Some(id) => Self::enumerate(host)?
                .into_iter()
                .find(|(candidate, _)| candidate == id)
                .map(|(_, device)| device)
                .ok_or_else(|| AudioError::DeviceNotFound(id.to_string())),
            None => host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceUnavailable("no default output".to_string())),
        }
    }
}

impl Default for CpalAudioOutputPort {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable id for an output: host, position and name.
pub fn device_id(host_id: &str, index: usize, name: &str) -> DeviceId {
    DeviceId(format!("cpal:{}:{}:{}", host_id, index, name))
}

/// Keeps the stream alive on its own thread until closed.
pub struct CpalAudioStreamHandle {
    stop_tx: mpsc::Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl AudioStreamHandle for CpalAudioStreamHandle {
    fn close(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                warn!("audio stream thread panicked");
            }
        }
    }
}

impl AudioOutputPort for CpalAudioOutputPort {
    fn list_outputs(&self) -> Result<Vec<AudioOutputDevice>, AudioError> {
        let mut results = Vec::new();
        for (id, device) in Self::enumerate(&self.host)? {
            let name = device.name().unwrap_or_else(|_| UNKNOWN_OUTPUT.to_string());
            let default_config = match device.default_output_config() {
                Ok(config) => config,
                Err(err) => {
                    debug!(%id, %err, "skipping output without default config");
                    continue;
                }
            };
            results.push(AudioOutputDevice {
                id,
                name,
                default_config: AudioConfig {
                    sample_rate_hz: default_config.sample_rate().0,
                    channels: default_config.channels(),
                    buffer_size_frames: None,
                },
            });
        }
        Ok(results)
    }

    fn open_output(
        &self,
        device_id: Option<&DeviceId>,
        config: AudioConfig,
        cb: Box<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        let wanted = device_id.cloned();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        // cpal streams are not Send on every platform, so the stream lives and dies
        // on this thread.
        let join_handle = thread::spawn(move || {
            let stream = match start_stream(wanted.as_ref(), config, cb) {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
            drop(stream);
            debug!("audio stream closed");
        });

        ready_rx
            .recv()
            .map_err(|e| AudioError::Backend(e.to_string()))??;

        Ok(Box::new(CpalAudioStreamHandle {
            stop_tx,
            join_handle: Some(join_handle),
        }))
    }
}

fn start_stream(
    wanted: Option<&DeviceId>,
    desired: AudioConfig,
    cb: Box<dyn AudioRenderCallback>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = CpalAudioOutputPort::resolve_device(&host, wanted)?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| AudioError::Backend(e.to_string()))?;
    let chosen = select_supported_config(supported, desired).ok_or_else(|| {
        AudioError::UnsupportedConfig(format!(
            "{} Hz, {} channels",
            desired.sample_rate_hz, desired.channels
        ))
    })?;

    let sample_format = chosen.sample_format();
    let mut stream_config = chosen.config();
    stream_config.buffer_size = match desired.buffer_size_frames {
        Some(frames) => BufferSize::Fixed(frames),
        None => BufferSize::Default,
    };

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, cb),
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, cb),
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, cb),
        other => Err(AudioError::UnsupportedConfig(format!(
            "sample format {:?}",
            other
        ))),
    }?;

    stream
        .play()
        .map_err(|e| AudioError::Backend(e.to_string()))?;

    info!(
        device = %device.name().unwrap_or_else(|_| UNKNOWN_OUTPUT.to_string()),
        rate = stream_config.sample_rate.0,
        channels = stream_config.channels,
        format = ?sample_format,
        "audio output started"
    );
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut cb: Box<dyn AudioRenderCallback>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let scratch = match config.buffer_size {
        BufferSize::Fixed(frames) => frames as usize,
        BufferSize::Default => DEFAULT_SCRATCH_FRAMES,
    };
    let mut left = vec![0.0_f32; scratch];
    let mut right = vec![0.0_f32; scratch];
    let mut sample_time: SampleTime = 0;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                if frames > left.len() {
                    left.resize(frames, 0.0);
                    right.resize(frames, 0.0);
                }
                cb.render(sample_time, &mut left[..frames], &mut right[..frames]);
                write_interleaved(data, channels, &left[..frames], &right[..frames]);
                sample_time = sample_time.saturating_add(frames as u64);
            },
            |err| error!(%err, "audio stream error"),
            None,
        )
        .map_err(|e| AudioError::Backend(e.to_string()))
}

/// Picks the best sample format among the ranges that support the requested
/// rate and channel count.
fn select_supported_config(
    supported: impl Iterator<Item = SupportedStreamConfigRange>,
    desired: AudioConfig,
) -> Option<SupportedStreamConfig> {
    supported
        .filter(|range| range.channels() == desired.channels)
        .filter(|range| {
            (range.min_sample_rate().0..=range.max_sample_rate().0)
                .contains(&desired.sample_rate_hz)
        })
        .filter_map(|range| format_rank(range.sample_format()).map(|rank| (rank, range)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, range)| range.with_sample_rate(SampleRate(desired.sample_rate_hz)))
}

fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::F32 => Some(3),
        SampleFormat::I16 => Some(2),
        SampleFormat::U16 => Some(1),
        _ => None,
    }
}

/// Writes the stereo pair into an interleaved buffer. Mono outputs get the
/// average; channels past the second are silent.
pub fn write_interleaved<T>(data: &mut [T], channels: usize, left: &[f32], right: &[f32])
where
    T: Sample + FromSample<f32>,
{
    if channels == 0 {
        return;
    }
    for (frame, out) in data.chunks_exact_mut(channels).enumerate() {
        let l = left.get(frame).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        let r = right.get(frame).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        if channels == 1 {
            out[0] = T::from_sample((l + r) * 0.5);
            continue;
        }
        out[0] = T::from_sample(l);
        out[1] = T::from_sample(r);
        for extra in &mut out[2..] {
            *extra = T::EQUILIBRIUM;
        }
    }
}
