//! Per-sample kernels for the six processing functions.
//!
//! All function state lives side by side in one record so that switching
//! the active function never discards accumulated state; only sub-state
//! that cannot carry over is re-initialized by the caller.

use crate::settings::ProcessorFunction;

/// Nominal audio amplitude in volts.
pub const AUDIO_VOLTS: f32 = 5.0;
/// Full-scale unipolar control voltage.
pub const CV_VOLTS: f32 = 8.0;
/// Hard output bound.
pub const RAIL_VOLTS: f32 = 12.0;

const GATE_ON_VOLTS: f32 = 1.0;
const GATE_OFF_VOLTS: f32 = 0.5;

/// Lorenz state after reset. Off-origin so the attractor cannot park on
/// the fixed point at zero.
const LORENZ_SEED: [f32; 3] = [0.1, 0.0, 0.0];

/// One-pole coefficient for a time constant in seconds.
#[inline]
fn time_coeff(seconds: f32, sample_rate: f32) -> f32 {
    if seconds <= 0.0 {
        return 0.0;
    }
    (-1.0 / (seconds * sample_rate)).exp()
}

/// Asymmetric one-pole follower update.
#[inline]
fn follow(level: &mut f32, input: f32, up: f32, down: f32) {
    let coeff = if input > *level { up } else { down };
    *level = coeff * *level + (1.0 - coeff) * input;
}

/// One sample of input to a function kernel. Knob values are already
/// smoothed; voltages are raw per-voice samples.
pub struct StepInput {
    pub excite: f32,
    pub signal: f32,
    pub level: f32,
    pub shape: f32,
    pub modk: f32,
    pub signal_connected: bool,
    pub level_connected: bool,
    pub sample_rate: f32,
}

/// How the channel's audio path is driven this sample.
pub enum AudioPath {
    /// Multiply the signal input by the VCA gain derived from `cv`.
    Vca,
    /// The kernel produced the output sample itself (filters, generator).
    Direct(f32),
}

pub struct StepOutput {
    /// Control value in [0, 2]; doubles as the meter's "Level" source.
    pub cv: f32,
    pub path: AudioPath,
}

/// Side-by-side state for all six functions.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionState {
    pub env_level: f32,
    pub env_rising: bool,
    pub gate_high: bool,
    pub cell_fast: f32,
    pub cell_slow: f32,
    pub follow_level: f32,
    pub comp_env: f32,
    pub comp_rms: f32,
    pub vcf_lp: f32,
    pub vcf_lp2: f32,
    pub lorenz: [f32; 3],
}

impl Default for FunctionState {
    fn default() -> Self {
        Self {
            env_level: 0.0,
            env_rising: false,
            gate_high: false,
            cell_fast: 0.0,
            cell_slow: 0.0,
            follow_level: 0.0,
            comp_env: 0.0,
            comp_rms: 0.0,
            vcf_lp: 0.0,
            vcf_lp2: 0.0,
            lorenz: LORENZ_SEED,
        }
    }
}

impl FunctionState {
    /// Return to quiescent values. Idempotent.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Track the excite gate with hysteresis. Returns (high, rising edge).
    fn gate(&mut self, excite: f32) -> (bool, bool) {
        let was = self.gate_high;
        if excite > GATE_ON_VOLTS {
            self.gate_high = true;
        } else if excite < GATE_OFF_VOLTS {
            self.gate_high = false;
        }
        (self.gate_high, self.gate_high && !was)
    }
}

/// Advance one function by one sample.
pub fn step(
    state: &mut FunctionState,
    function: ProcessorFunction,
    alternate: bool,
    input: &StepInput,
) -> StepOutput {
    let sr = input.sample_rate;
    match function {
        ProcessorFunction::Envelope => {
            let (gate_high, rising) = state.gate(input.excite);
            let attack_s = 0.0005 + 0.3 * input.shape * input.shape;
            let decay_s = 0.005 + 2.0 * input.modk * input.modk;
            if alternate {
                // AR: track the gate with separate rise/fall constants
                let target = if gate_high { 1.0 } else { 0.0 };
                let coeff = if target > state.env_level {
                    time_coeff(attack_s, sr)
                } else {
                    time_coeff(decay_s, sr)
                };
                state.env_level = coeff * state.env_level + (1.0 - coeff) * target;
            } else {
                // AD: an excite edge starts a full attack/decay cycle
                if rising {
                    state.env_rising = true;
                }
                if state.env_rising {
                    let coeff = time_coeff(attack_s, sr);
                    // aim slightly past 1.0 so the peak is actually reached
                    state.env_level = coeff * state.env_level + (1.0 - coeff) * 1.02;
                    if state.env_level >= 1.0 {
                        state.env_level = 1.0;
                        state.env_rising = false;
                    }
                } else {
                    state.env_level *= time_coeff(decay_s, sr);
                }
            }
            StepOutput { cv: state.env_level.clamp(0.0, 1.0), path: AudioPath::Vca }
        }

        ProcessorFunction::Vactrol => {
            let (_, rising) = state.gate(input.excite);
            if alternate {
                // plucked: inject a strike on each edge, then free decay
                if rising {
                    state.cell_fast = 1.0;
                    state.cell_slow = (state.cell_slow + 0.7).min(1.0);
                }
                let fast_down = time_coeff(0.04 + 0.3 * input.shape, sr);
                let slow_down = time_coeff(0.3 + 2.0 * input.shape, sr);
                state.cell_fast *= fast_down;
                state.cell_slow *= slow_down;
            } else {
                let drive = (input.excite / CV_VOLTS).abs().min(1.0);
                let fast_up = time_coeff(0.002, sr);
                let fast_down = time_coeff(0.05 + 0.2 * input.shape, sr);
                let slow_up = time_coeff(0.01, sr);
                let slow_down = time_coeff(0.2 + 2.0 * input.shape, sr);
                follow(&mut state.cell_fast, drive, fast_up, fast_down);
                follow(&mut state.cell_slow, drive, slow_up, slow_down);
            }
            let blend = input.modk;
            let cv = (1.0 - blend) * state.cell_fast + blend * state.cell_slow;
            StepOutput { cv: cv.clamp(0.0, 1.0), path: AudioPath::Vca }
        }

        ProcessorFunction::Follower => {
            let rect = (input.excite / CV_VOLTS).abs().min(2.0);
            let up = time_coeff(0.0005 + 0.05 * input.shape * input.shape, sr);
            let down = time_coeff(0.01 + 1.0 * input.modk * input.modk, sr);
            follow(&mut state.follow_level, rect, up, down);
            let cv = state.follow_level.min(1.0);
            if alternate {
                // cutoff controller: the follower drives a lowpass instead
                // of the VCA, 20 Hz .. 20 kHz exponential
                let cutoff = 20.0 * 1000.0_f32.powf(cv);
                let a = (-2.0 * std::f32::consts::PI * cutoff / sr).exp();
                state.vcf_lp = (1.0 - a) * input.signal + a * state.vcf_lp;
                StepOutput { cv, path: AudioPath::Direct(state.vcf_lp) }
            } else {
                StepOutput { cv, path: AudioPath::Vca }
            }
        }

        ProcessorFunction::Compressor => {
            // excite is normalled onto the detector alongside the signal
            let mut detector = (input.signal / AUDIO_VOLTS)
                .abs()
                .max((input.excite / CV_VOLTS).abs());
            let (attack_s, release_s) = if alternate {
                (0.08, 0.8)
            } else {
                (0.005, 0.1)
            };
            if alternate {
                // slow compressor levels on an RMS estimate
                state.comp_rms = 0.999 * state.comp_rms + 0.001 * detector * detector;
                detector = state.comp_rms.sqrt();
            }
            let up = time_coeff(attack_s, sr);
            let down = time_coeff(release_s, sr);
            follow(&mut state.comp_env, detector, up, down);

            let threshold_db = -40.0 + 36.0 * input.shape;
            let ratio = 1.0 + 19.0 * input.modk;
            let threshold_lin = 10.0_f32.powf(threshold_db / 20.0);
            let gain = if state.comp_env > threshold_lin && state.comp_env > 1e-12 {
                let over_db = 20.0 * (state.comp_env / threshold_lin).log10();
                let reduction_db = over_db * (1.0 - 1.0 / ratio);
                10.0_f32.powf(-reduction_db / 20.0)
            } else {
                1.0
            };
            let makeup_db = threshold_db.abs() * (1.0 - 1.0 / ratio) * 0.3;
            let makeup = 10.0_f32.powf(makeup_db / 20.0).min(4.0);
            StepOutput { cv: (gain * makeup).clamp(0.0, 2.0), path: AudioPath::Vca }
        }

        ProcessorFunction::FilterController => {
            let norm = if alternate {
                // direct VCF: the level CV sets the cutoff, shape offsets it
                let cv_in = if input.level_connected {
                    input.level / CV_VOLTS
                } else {
                    0.0
                };
                (input.shape + cv_in).clamp(0.0, 1.0)
            } else {
                let rect = (input.excite / CV_VOLTS).abs().min(1.0);
                follow(
                    &mut state.follow_level,
                    rect,
                    time_coeff(0.002, sr),
                    time_coeff(0.1, sr),
                );
                (input.shape + input.modk * state.follow_level).clamp(0.0, 1.0)
            };
            let cutoff = 20.0 * 1000.0_f32.powf(norm);
            let a = (-2.0 * std::f32::consts::PI * cutoff / sr).exp();
            state.vcf_lp = (1.0 - a) * input.signal + a * state.vcf_lp;
            state.vcf_lp2 = (1.0 - a) * state.vcf_lp + a * state.vcf_lp2;
            StepOutput { cv: norm, path: AudioPath::Direct(state.vcf_lp2) }
        }

        ProcessorFunction::LorenzGenerator => {
            let sigma = 10.0_f32;
            let beta = 8.0 / 3.0_f32;
            let rho = 20.0 + 20.0 * input.modk;
            // integration speed follows wall-clock across sample rates
            let dt = (0.0002 + 0.01 * input.shape * input.shape) * (48000.0 / sr);
            let [x, y, z] = state.lorenz;
            let dx = sigma * (y - x);
            let dy = x * (rho - z) - y;
            let dz = x * y - beta * z;
            state.lorenz = [
                (x + dx * dt).clamp(-80.0, 80.0),
                (y + dy * dt).clamp(-80.0, 80.0),
                (z + dz * dt).clamp(-80.0, 80.0),
            ];
            let x_norm = (state.lorenz[0] / 20.0).clamp(-1.0, 1.0);
            let cv = 0.5 + 0.5 * x_norm;
            if input.signal_connected {
                StepOutput { cv, path: AudioPath::Vca }
            } else {
                // nothing patched: the attractor itself is the output
                StepOutput { cv, path: AudioPath::Direct(x_norm * AUDIO_VOLTS) }
            }
        }
    }
}
