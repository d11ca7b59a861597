//! Per-channel processor.
//!
//! Owns one channel's function state, knob smoothing, function-button
//! cycling, the VCA response stage, and the four-segment bicolor meter.

use crate::engine::ChannelFrame;
use crate::functions::{self, AudioPath, FunctionState, StepInput, AUDIO_VOLTS, CV_VOLTS, RAIL_VOLTS};
use crate::settings::{MonitorMode, ProcessorFunction};
use crate::smoothing::Smoothed;

/// LED refresh divider, in samples.
const LIGHT_REFRESH_SAMPLES: u32 = 32;
/// Knob smoothing time constant.
const KNOB_RAMP_MS: f32 = 5.0;

/// Brightness of one meter segment for a value in [0, 1].
fn segment(value: f32, index: usize) -> f32 {
    let lo = index as f32 * 0.25;
    ((value - lo) * 4.0).clamp(0.0, 1.0)
}

pub struct ChannelProcessor {
    function: ProcessorFunction,
    alternate: bool,
    state: FunctionState,
    sample_rate: f32,
    shape: Smoothed,
    modk: Smoothed,
    level_mod: Smoothed,
    response: Smoothed,
    button_high: bool,
    light_phase: u32,
    meter_pos: f32,
    meter_neg: f32,
    led_green: [f32; 4],
    led_red: [f32; 4],
}

impl ChannelProcessor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            function: ProcessorFunction::default(),
            alternate: false,
            state: FunctionState::default(),
            sample_rate,
            shape: Smoothed::new(0.0, KNOB_RAMP_MS, sample_rate),
            modk: Smoothed::new(0.5, KNOB_RAMP_MS, sample_rate),
            level_mod: Smoothed::new(0.0, KNOB_RAMP_MS, sample_rate),
            response: Smoothed::new(0.0, KNOB_RAMP_MS, sample_rate),
            button_high: false,
            light_phase: 0,
            meter_pos: 0.0,
            meter_neg: 0.0,
            led_green: [0.0; 4],
            led_red: [0.0; 4],
        }
    }

    pub fn function(&self) -> ProcessorFunction {
        self.function
    }

    pub fn alternate(&self) -> bool {
        self.alternate
    }

    pub(crate) fn state(&self) -> &FunctionState {
        &self.state
    }

    /// Clear DSP and LED state to quiescent values. Idempotent; the
    /// active function selection is left alone.
    pub fn reset(&mut self) {
        self.state.reset();
        self.shape.snap(0.0);
        self.modk.snap(0.5);
        self.level_mod.snap(0.0);
        self.response.snap(0.0);
        self.button_high = false;
        self.light_phase = 0;
        self.meter_pos = 0.0;
        self.meter_neg = 0.0;
        self.led_green = [0.0; 4];
        self.led_red = [0.0; 4];
    }

    /// Re-derive time constants from the new rate. Accumulated
    /// envelope/filter state is untouched.
    pub fn set_sample_rate(&mut self, rate: f32) {
        self.sample_rate = rate;
        self.shape.set_ramp(KNOB_RAMP_MS, rate);
        self.modk.set_ramp(KNOB_RAMP_MS, rate);
        self.level_mod.set_ramp(KNOB_RAMP_MS, rate);
        self.response.set_ramp(KNOB_RAMP_MS, rate);
    }

    /// Switch the active function without a pipeline reset. State carries
    /// over; only the envelope stage machine restarts idle, since a
    /// half-finished attack from another mode has no meaning here.
    pub fn apply_function(&mut self, function: ProcessorFunction, alternate: bool) {
        if self.function == function && self.alternate == alternate {
            return;
        }
        if function == ProcessorFunction::Envelope && self.function != ProcessorFunction::Envelope {
            self.state.env_rising = false;
        }
        self.function = function;
        self.alternate = alternate;
    }

    /// One step of the function-button cycle:
    /// normal -> alternate -> next function's normal, wrapping.
    pub fn cycle_mode(&mut self) {
        let (function, alternate) = if self.alternate {
            (self.function.next(), false)
        } else {
            (self.function, true)
        };
        self.apply_function(function, alternate);
    }

    /// Rising-edge detector for the function button.
    pub fn poll_button(&mut self, value: f32) -> bool {
        let high = value > 0.5;
        let edge = high && !self.button_high;
        self.button_high = high;
        edge
    }

    /// Draw new bounded interior state for stochastic behavior. The
    /// function selection is preserved.
    pub fn randomize_state<R: rand::Rng>(&mut self, rng: &mut R) {
        self.state.env_level = rng.gen_range(0.0..1.0);
        self.state.cell_fast = rng.gen_range(0.0..1.0);
        self.state.cell_slow = rng.gen_range(0.0..1.0);
        self.state.follow_level = rng.gen_range(0.0..1.0);
        self.state.lorenz = [
            rng.gen_range(-15.0..15.0),
            rng.gen_range(-20.0..20.0),
            rng.gen_range(5.0..35.0),
        ];
    }

    /// Advance one sample. Writes `signal_out` and the LED pairs into the
    /// frame; returns true iff the LED state actually changed.
    pub fn process(&mut self, frame: &mut ChannelFrame, monitor: MonitorMode) -> bool {
        self.shape.set_target(frame.shape_knob);
        self.modk.set_target(frame.mod_knob);
        self.level_mod.set_target(frame.level_mod_knob);
        self.response.set_target(frame.response_knob);
        let shape = self.shape.next();
        let modk = self.modk.next();
        let level_mod = self.level_mod.next();
        let response = self.response.next();

        let input = StepInput {
            excite: frame.excite_in,
            signal: frame.signal_in,
            level: frame.level_cv,
            shape,
            modk,
            signal_connected: frame.signal_in_connected,
            level_connected: frame.level_cv_connected,
            sample_rate: self.sample_rate,
        };
        let out = functions::step(&mut self.state, self.function, self.alternate, &input);

        // Level stage: the level-mod knob sets how deep the level CV cuts
        // into the VCA; unpatched level means full level.
        let level = if frame.level_cv_connected {
            (frame.level_cv / CV_VOLTS).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let level = 1.0 + level_mod * (level - 1.0);
        let vca_gain = {
            let g = (out.cv * level).clamp(0.0, 2.0);
            // response knob morphs linear -> exponential-feel
            ((1.0 - response) * g + response * g * g * g).clamp(0.0, 2.0)
        };

        let sample = match out.path {
            AudioPath::Vca => frame.signal_in * vca_gain,
            AudioPath::Direct(v) => v,
        };
        frame.signal_out = sample.clamp(-RAIL_VOLTS, RAIL_VOLTS);

        // Meter source per monitor mode, normalized to [-1, 1]
        let meter = match monitor {
            MonitorMode::ExciteIn => frame.excite_in / CV_VOLTS,
            MonitorMode::VcaCv => vca_gain.min(1.0),
            MonitorMode::AudioIn => frame.signal_in / AUDIO_VOLTS,
            MonitorMode::Output => frame.signal_out / AUDIO_VOLTS,
        };
        if meter >= 0.0 {
            self.meter_pos = self.meter_pos.max(meter.min(1.0));
        } else {
            self.meter_neg = self.meter_neg.max((-meter).min(1.0));
        }

        self.light_phase += 1;
        let mut changed = false;
        if self.light_phase >= LIGHT_REFRESH_SAMPLES {
            self.light_phase = 0;
            for i in 0..4 {
                let green = segment(self.meter_pos, i);
                let red = segment(self.meter_neg, i);
                changed |= green != self.led_green[i] || red != self.led_red[i];
                self.led_green[i] = green;
                self.led_red[i] = red;
            }
            self.meter_pos = 0.0;
            self.meter_neg = 0.0;
        }
        frame.led_green = self.led_green;
        frame.led_red = self.led_red;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn frame() -> ChannelFrame {
        ChannelFrame {
            mod_knob: 0.5,
            signal_in_connected: true,
            ..ChannelFrame::default()
        }
    }

    #[test]
    fn button_cycle_covers_all_twelve_modes() {
        let mut p = ChannelProcessor::new(SR);
        let start = (p.function(), p.alternate());
        let mut seen = vec![start];
        for _ in 0..11 {
            p.cycle_mode();
            let mode = (p.function(), p.alternate());
            assert!(!seen.contains(&mode), "repeated mode {mode:?}");
            seen.push(mode);
        }
        p.cycle_mode();
        assert_eq!((p.function(), p.alternate()), start);
    }

    #[test]
    fn cycle_goes_normal_then_alternate_then_next() {
        let mut p = ChannelProcessor::new(SR);
        assert_eq!(p.function(), ProcessorFunction::Envelope);
        assert!(!p.alternate());
        p.cycle_mode();
        assert_eq!(p.function(), ProcessorFunction::Envelope);
        assert!(p.alternate());
        p.cycle_mode();
        assert_eq!(p.function(), ProcessorFunction::Vactrol);
        assert!(!p.alternate());
    }

    #[test]
    fn button_edge_detection() {
        let mut p = ChannelProcessor::new(SR);
        assert!(!p.poll_button(0.0));
        assert!(p.poll_button(1.0));
        assert!(!p.poll_button(1.0)); // held, no new edge
        assert!(!p.poll_button(0.0));
        assert!(p.poll_button(1.0));
    }

    #[test]
    fn apply_function_is_idempotent_and_preserves_state() {
        let mut p = ChannelProcessor::new(SR);
        p.apply_function(ProcessorFunction::Follower, false);
        let mut f = frame();
        f.excite_in = 6.0;
        for _ in 0..1000 {
            p.process(&mut f, MonitorMode::ExciteIn);
        }
        let before = p.state.clone();
        p.apply_function(ProcessorFunction::Follower, false);
        assert_eq!(p.state, before);
        // Switching away keeps the accumulated follower level
        p.apply_function(ProcessorFunction::Compressor, false);
        assert_eq!(p.state.follow_level, before.follow_level);
    }

    #[test]
    fn reset_is_idempotent_and_quiescent() {
        let mut p = ChannelProcessor::new(SR);
        let mut f = frame();
        f.excite_in = 8.0;
        f.signal_in = 4.0;
        for _ in 0..1000 {
            p.process(&mut f, MonitorMode::Output);
        }
        p.reset();
        let once = p.state.clone();
        p.reset();
        assert_eq!(p.state, once);
        assert_eq!(p.led_green, [0.0; 4]);
        assert_eq!(p.led_red, [0.0; 4]);
    }

    #[test]
    fn vca_passes_signal_when_envelope_open() {
        let mut p = ChannelProcessor::new(SR);
        p.apply_function(ProcessorFunction::Envelope, true); // AR: tracks gate
        let mut f = frame();
        f.excite_in = 8.0;
        f.signal_in = 4.0;
        f.mod_knob = 0.0;
        let mut out = 0.0;
        for _ in 0..48000 {
            p.process(&mut f, MonitorMode::Output);
            out = f.signal_out;
        }
        assert!((out - 4.0).abs() < 0.2, "VCA not open, out={out}");
        assert!(out.abs() <= RAIL_VOLTS);
    }

    #[test]
    fn sample_rate_roundtrip_is_transparent() {
        let mut a = ChannelProcessor::new(SR);
        let mut b = ChannelProcessor::new(SR);
        let mut fa = frame();
        let mut fb = frame();
        fa.excite_in = 5.0;
        fb.excite_in = 5.0;
        fa.signal_in = 3.0;
        fb.signal_in = 3.0;
        for _ in 0..500 {
            a.process(&mut fa, MonitorMode::Output);
            b.process(&mut fb, MonitorMode::Output);
        }
        // A -> B -> A with no processing in between
        b.set_sample_rate(96000.0);
        b.set_sample_rate(SR);
        for _ in 0..500 {
            a.process(&mut fa, MonitorMode::Output);
            b.process(&mut fb, MonitorMode::Output);
            assert_eq!(fa.signal_out, fb.signal_out);
        }
    }

    #[test]
    fn lights_refresh_on_divider_and_only_on_change() {
        let mut p = ChannelProcessor::new(SR);
        let mut f = frame();
        // Constant zero input: after the first refresh nothing changes
        let mut updates = 0;
        for _ in 0..(LIGHT_REFRESH_SAMPLES * 8) {
            if p.process(&mut f, MonitorMode::ExciteIn) {
                updates += 1;
            }
        }
        assert_eq!(updates, 0, "dark meter must not report changes");
        // A hot excite input lights the ladder on a refresh boundary
        f.excite_in = 8.0;
        let mut lit = false;
        for _ in 0..(LIGHT_REFRESH_SAMPLES * 2) {
            lit |= p.process(&mut f, MonitorMode::ExciteIn);
        }
        assert!(lit);
        assert!(f.led_green.iter().all(|&g| g > 0.99));
    }
}
