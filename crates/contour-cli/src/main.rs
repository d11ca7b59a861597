//! CLI driver for the contour engine.
//!
//! Synthesizes test inputs (or reads a WAV for the signal path), drives
//! the engine bank sample by sample, and writes the processed audio as a
//! stereo WAV (channel 1 left, channel 2 right).

use clap::Parser;
use contour_dsp::{EngineBank, Frame, AUDIO_VOLTS, CHANNEL_MODES, MONITOR_MODES, NUM_ENGINES, NUM_LIGHTS};
use hound::{SampleFormat, WavSpec, WavWriter};

const SR: u32 = 48000;

#[derive(Parser)]
#[command(name = "contour", about = "Two-channel dynamics/envelope processor driver")]
struct Cli {
    /// Input WAV for the signal path (omit to use a generated chord)
    input_wav: Option<String>,

    /// Output WAV path
    #[arg(short, long, default_value = "contour_out.wav")]
    output: String,

    /// Channel 1 mode index (see --list-modes)
    #[arg(long, default_value_t = 0)]
    mode1: usize,

    /// Channel 2 mode index
    #[arg(long, default_value_t = 0)]
    mode2: usize,

    /// Monitor mode index (see --list-modes)
    #[arg(long, default_value_t = 0)]
    monitor: usize,

    /// Link both channels' function selection
    #[arg(long)]
    link: bool,

    /// Number of polyphonic voices to run
    #[arg(long, default_value_t = 1)]
    voices: usize,

    /// Duration in seconds when generating input
    #[arg(long, default_value_t = 4.0)]
    duration: f32,

    /// Shape knob, [0, 1]
    #[arg(long, default_value_t = 0.5)]
    shape: f32,

    /// Mod knob, [0, 1]
    #[arg(long = "mod", default_value_t = 0.5)]
    mod_knob: f32,

    /// Level-mod knob, [0, 1]
    #[arg(long, default_value_t = 0.0)]
    level_mod: f32,

    /// Response knob, [0, 1]
    #[arg(long, default_value_t = 0.0)]
    response: f32,

    /// List channel and monitor modes, then exit
    #[arg(long)]
    list_modes: bool,
}

// ---------------------------------------------------------------------------
// Test signal generators
// ---------------------------------------------------------------------------

/// Excite input: 5 V gate bursts, one per half second.
fn gen_gate_bursts(sr: u32, n: usize) -> Vec<f32> {
    let period = sr as usize / 2;
    let width = sr as usize / 10;
    (0..n)
        .map(|i| if i % period < width { 5.0 } else { 0.0 })
        .collect()
}

/// Signal input: a sustained minor chord with a few harmonics.
fn gen_chord(sr: u32, n: usize) -> Vec<f32> {
    let fundamentals = [130.81_f32, 155.56, 196.00];
    let mut signal = vec![0.0_f32; n];
    for fund in fundamentals {
        for harmonic in 1..=3 {
            let amplitude = 1.0 / harmonic as f32;
            for (i, s) in signal.iter_mut().enumerate() {
                let t = i as f32 / sr as f32;
                *s += amplitude
                    * (2.0 * std::f32::consts::PI * fund * harmonic as f32 * t).sin();
            }
        }
    }
    let peak = signal.iter().map(|s| s.abs()).fold(0.0_f32, f32::max);
    if peak > 0.0 {
        let scale = 0.8 * AUDIO_VOLTS / peak;
        for s in signal.iter_mut() {
            *s *= scale;
        }
    }
    signal
}

fn read_signal_wav(path: &str) -> (u32, Vec<f32>) {
    let reader = hound::WavReader::open(path).unwrap_or_else(|e| {
        eprintln!("Failed to open {}: {}", path, e);
        std::process::exit(1);
    });
    let spec = reader.spec();
    let channels = spec.channels as usize;
    let bits = spec.bits_per_sample;
    eprintln!(
        "Input: {} ch, {} Hz, {}-bit, {} samples/ch",
        channels,
        spec.sample_rate,
        bits,
        reader.len() as usize / channels
    );

    // First channel only, scaled to nominal audio volts
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1_i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .step_by(channels)
                .map(|s| s.unwrap() as f32 / max_val * AUDIO_VOLTS)
                .collect()
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .step_by(channels)
            .map(|s| s.unwrap() * AUDIO_VOLTS)
            .collect(),
    };
    (spec.sample_rate, samples)
}

fn list_modes() {
    println!("Channel modes:");
    for (i, mode) in CHANNEL_MODES.iter().enumerate() {
        println!("  {:2}  {}", i, mode.label);
    }
    println!("Monitor modes:");
    for (i, mode) in MONITOR_MODES.iter().enumerate() {
        println!("  {:2}  {}", i, mode.label);
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.list_modes {
        list_modes();
        return;
    }
    if cli.mode1 >= CHANNEL_MODES.len() || cli.mode2 >= CHANNEL_MODES.len() {
        eprintln!("Mode index out of range; see --list-modes");
        std::process::exit(1);
    }
    if cli.monitor >= MONITOR_MODES.len() {
        eprintln!("Monitor index out of range; see --list-modes");
        std::process::exit(1);
    }

    let (sr, signal) = match &cli.input_wav {
        Some(path) => read_signal_wav(path),
        None => {
            let n = (SR as f32 * cli.duration) as usize;
            (SR, gen_chord(SR, n))
        }
    };
    let n = signal.len();
    let excite = gen_gate_bursts(sr, n);

    let mut bank = EngineBank::new();
    bank.set_sample_rate(sr as f32);
    bank.set_channel_mode(0, cli.mode1);
    bank.set_channel_mode(1, cli.mode2);
    bank.set_monitor_mode(cli.monitor);
    if cli.link {
        bank.toggle_link();
    }
    let voices = cli.voices.clamp(1, NUM_ENGINES);
    bank.set_active_channels(voices);

    eprintln!(
        "Processing {} samples, {} voice(s): ch1={} ch2={}",
        n,
        voices,
        CHANNEL_MODES[cli.mode1].label,
        CHANNEL_MODES[cli.mode2].label,
    );

    let mut frame = Frame::default();
    for ch in [&mut frame.ch1, &mut frame.ch2] {
        ch.shape_knob = cli.shape.clamp(0.0, 1.0);
        ch.mod_knob = cli.mod_knob.clamp(0.0, 1.0);
        ch.level_mod_knob = cli.level_mod.clamp(0.0, 1.0);
        ch.response_knob = cli.response.clamp(0.0, 1.0);
        ch.signal_in_connected = true;
        ch.level_cv_connected = false;
    }

    let mut out_l = Vec::with_capacity(n);
    let mut out_r = Vec::with_capacity(n);
    let mut light_peaks = [0.0_f32; NUM_LIGHTS];

    for i in 0..n {
        for v in 0..voices {
            frame.ch1.excite_in = excite[i];
            frame.ch1.signal_in = signal[i];
            frame.ch2.excite_in = excite[i];
            frame.ch2.signal_in = signal[i];
            bank.process_voice(v, &mut frame);
            if v == 0 {
                out_l.push(frame.ch1.signal_out / AUDIO_VOLTS);
                out_r.push(frame.ch2.signal_out / AUDIO_VOLTS);
            }
        }
        bank.update_lights();
        for (peak, &light) in light_peaks.iter_mut().zip(bank.lights()) {
            *peak = peak.max(light);
        }
    }

    let spec = WavSpec {
        channels: 2,
        sample_rate: sr,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&cli.output, spec).unwrap_or_else(|e| {
        eprintln!("Failed to create {}: {}", cli.output, e);
        std::process::exit(1);
    });
    for i in 0..n {
        writer.write_sample(out_l[i]).unwrap();
        writer.write_sample(out_r[i]).unwrap();
    }
    writer.finalize().unwrap();

    let peak = out_l
        .iter()
        .chain(out_r.iter())
        .map(|s| s.abs())
        .fold(0.0_f32, f32::max);
    let lit = light_peaks.iter().filter(|&&b| b > 0.01).count();
    eprintln!(
        "Written {} (peak {:.3}, {}/{} meter segments active)",
        cli.output, peak, lit, NUM_LIGHTS
    );
}
