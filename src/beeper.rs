use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Stream, StreamConfig,
};
use spin_sleep::SpinSleeper;

/// System clock of the simulated target.
pub const SYS_CLOCK_HZ: u32 = 125_000_000;
/// Fixed divider feeding the buzzer's PWM slice.
pub const PWM_DIVIDER: f64 = 64.0;
/// Target buzzer tone.
pub const BUZZER_TONE_HZ: f64 = 2000.0;

/// PWM slice settings for the buzzer line, derived once at startup from
/// the system clock, the fixed divider and the target tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneConfig {
    clock_hz: u32,
    divider: f64,
    wrap: u32,
}

impl ToneConfig {
    pub fn new(clock_hz: u32, divider: f64, target_hz: f64) -> Self {
        // Round to nearest; truncating shifts the tone audibly.
        let wrap = (clock_hz as f64 / (divider * target_hz)).round() as u32 - 1;
        Self {
            clock_hz,
            divider,
            wrap,
        }
    }

    /// Counter threshold defining one PWM period.
    pub fn wrap(&self) -> u32 {
        self.wrap
    }

    /// Compare level for a 50% duty cycle.
    pub fn duty_level(&self) -> u32 {
        self.wrap / 2
    }

    /// The tone the slice actually produces with the rounded wrap.
    pub fn frequency(&self) -> f64 {
        self.clock_hz as f64 / (self.divider * (self.wrap as f64 + 1.0))
    }
}

/// Discrete tone bursts, no tail.
pub trait Buzzer {
    fn beep(&mut self, duration: Duration);
}

/// Host rendition of the buzzer: a square wave at the configured tone,
/// gated by a flag shared with the audio callback.
pub struct Beeper {
    stream: Option<Stream>,
    shared_state_ptr: Arc<AtomicBool>,
    tone: ToneConfig,
    sleeper: SpinSleeper,
}

impl Beeper {
    pub fn new(tone: ToneConfig) -> Self {
        Self {
            stream: None,
            shared_state_ptr: Arc::new(AtomicBool::new(false)),
            tone,
            sleeper: SpinSleeper::default(),
        }
    }

    /// Opens the host audio output. Without one the buzzer stays silent
    /// but `beep` keeps its timing, so the firmware runs headless.
    pub fn start_stream(&mut self) {
        let host = cpal::default_host();
        let device = match host.default_output_device() {
            Some(device) => device,
            None => {
                log::warn!("no audio output device; buzzer will be silent");
                return;
            }
        };
        let config = match device.default_output_config() {
            Ok(config) => config,
            Err(err) => {
                log::warn!("no usable output config; buzzer will be silent: {}", err);
                return;
            }
        };

        let state_ptr = self.shared_state_ptr.clone();
        let tone_hz = self.tone.frequency() as f32;
        log::debug!(
            "buzzer slice: wrap {} level {} tone {:.1} Hz",
            self.tone.wrap(),
            self.tone.duty_level(),
            tone_hz
        );

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                make_stream::<f32>(state_ptr, tone_hz, &device, &config.into())
            }
            cpal::SampleFormat::I16 => {
                make_stream::<i16>(state_ptr, tone_hz, &device, &config.into())
            }
            cpal::SampleFormat::U16 => {
                make_stream::<u16>(state_ptr, tone_hz, &device, &config.into())
            }
        };

        match stream {
            Ok(stream) => match stream.play() {
                Ok(()) => self.stream = Some(stream),
                Err(err) => log::warn!("could not start audio stream: {}", err),
            },
            Err(err) => log::warn!("could not build audio stream: {}", err),
        }
    }

    pub fn stop_stream(&mut self) {
        self.stream = None
    }
}

impl Buzzer for Beeper {
    fn beep(&mut self, duration: Duration) {
        self.shared_state_ptr.store(true, Ordering::Relaxed);
        self.sleeper.sleep(duration);
        self.shared_state_ptr.store(false, Ordering::Relaxed);
    }
}

fn make_stream<T>(
    shared_state_ptr: Arc<AtomicBool>,
    tone_hz: f32,
    device: &cpal::Device,
    config: &StreamConfig,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: cpal::Sample,
{
    let sample_rate = config.sample_rate.0 as f32;
    let channels = config.channels as usize;

    // 50% duty square wave, like the PWM slice on the real board.
    let period = sample_rate / tone_hz;
    let mut sample_clock = 0f32;
    let mut square_value_fn = move || {
        sample_clock = (sample_clock + 1.0) % period;
        if sample_clock < period / 2.0 {
            0.4
        } else {
            -0.4
        }
    };
    let mut silence_value_fn = || 0.0;

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if shared_state_ptr.load(Ordering::Relaxed) {
                write_data(data, channels, &mut square_value_fn)
            } else {
                write_data(data, channels, &mut silence_value_fn)
            }
        },
        |err| log::error!("an error occurred on stream: {}", err),
    )
}

fn write_data<T>(output: &mut [T], channels: usize, next_sample: &mut dyn FnMut() -> f32)
where
    T: cpal::Sample,
{
    for frame in output.chunks_mut(channels) {
        let value: T = cpal::Sample::from::<f32>(&next_sample());
        for sample in frame.iter_mut() {
            *sample = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ToneConfig, BUZZER_TONE_HZ, PWM_DIVIDER, SYS_CLOCK_HZ};
    use proptest::prelude::*;

    #[test]
    fn wrap_value_test() {
        // round(125000000 / (64 * 2000)) - 1 = round(976.5625) - 1 = 976
        let tone = ToneConfig::new(SYS_CLOCK_HZ, PWM_DIVIDER, BUZZER_TONE_HZ);
        assert_eq!(tone.wrap(), 976);
        assert_eq!(tone.duty_level(), 488);
    }

    #[test]
    fn wrap_rounds_to_nearest_test() {
        // 125000000 / (64 * 1900) = 1027.96..; truncation would give 1026
        let tone = ToneConfig::new(SYS_CLOCK_HZ, PWM_DIVIDER, 1900.0);
        assert_eq!(tone.wrap(), 1027);
    }

    #[test]
    fn realized_frequency_test() {
        let tone = ToneConfig::new(SYS_CLOCK_HZ, PWM_DIVIDER, BUZZER_TONE_HZ);
        // 125 MHz / (64 * 977)
        let expected = 125_000_000.0 / (64.0 * 977.0);
        assert!((tone.frequency() - expected).abs() < 1e-9);
    }

    proptest! {
        // Across the audible range the rounded wrap keeps the realized
        // tone within half a counter step of the request.
        #[test]
        fn tone_accuracy_proptest(target in 200.0f64..8000.0) {
            let tone = ToneConfig::new(SYS_CLOCK_HZ, PWM_DIVIDER, target);
            let relative_error = (tone.frequency() - target).abs() / target;
            prop_assert!(relative_error < 0.005);
        }
    }
}
