//! Per-voice stream engine: two channel processors under one shared
//! settings copy.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::processor::ChannelProcessor;
use crate::settings::UiSettings;

/// One channel's slice of the per-sample exchange record.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelFrame {
    // per-voice inputs (volts)
    pub excite_in: f32,
    pub signal_in: f32,
    pub level_cv: f32,
    // per-block control values, [0, 1]
    pub shape_knob: f32,
    pub mod_knob: f32,
    pub level_mod_knob: f32,
    pub response_knob: f32,
    pub signal_in_connected: bool,
    pub level_cv_connected: bool,
    pub function_button: f32,
    // outputs
    pub signal_out: f32,
    pub led_green: [f32; 4],
    pub led_red: [f32; 4],
}

/// Per-sample exchange record. Stack-allocated by the caller and reused
/// across voices within one block; only the per-voice fields change
/// between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frame {
    pub ch1: ChannelFrame,
    pub ch2: ChannelFrame,
    pub metering_button: f32,
    /// Set by `Engine::process`: true iff either channel's LED state
    /// changed this call.
    pub lights_updated: bool,
}

pub struct Engine {
    settings: UiSettings,
    ch: [ChannelProcessor; 2],
    metering_high: bool,
    rng: ChaCha8Rng,
}

impl Engine {
    /// `voice` seeds this engine's RNG so randomization is deterministic
    /// per voice slot.
    pub fn new(voice: usize) -> Self {
        Self {
            settings: UiSettings::default(),
            ch: [ChannelProcessor::new(48000.0), ChannelProcessor::new(48000.0)],
            metering_high: false,
            rng: ChaCha8Rng::seed_from_u64((voice * 7 + 42) as u64),
        }
    }

    pub fn ui_settings(&self) -> &UiSettings {
        &self.settings
    }

    /// Per-channel reset plus default settings.
    pub fn reset(&mut self) {
        self.settings = UiSettings::default();
        for (i, ch) in self.ch.iter_mut().enumerate() {
            ch.reset();
            ch.apply_function(self.settings.function[i], self.settings.alternate[i]);
        }
        self.metering_high = false;
    }

    pub fn set_sample_rate(&mut self, rate: f32) {
        for ch in &mut self.ch {
            ch.set_sample_rate(rate);
        }
    }

    /// Overwrite this engine's settings and re-derive each channel's
    /// active function/variant. Called identically on every voice of a
    /// module for any settings change.
    pub fn apply_settings(&mut self, settings: &UiSettings) {
        self.settings = *settings;
        for (i, ch) in self.ch.iter_mut().enumerate() {
            ch.apply_function(settings.function[i], settings.alternate[i]);
        }
    }

    /// Inherit another engine's settings and active function/variant
    /// without touching this engine's audio-rate state. Used when a
    /// previously inactive voice becomes active.
    pub fn sync_ui(&mut self, other: &Engine) {
        self.apply_settings(&other.settings);
    }

    /// New bounded pseudo-random interior state for stochastic elements.
    /// Function identity is preserved.
    pub fn randomize(&mut self) {
        for ch in &mut self.ch {
            ch.randomize_state(&mut self.rng);
        }
    }

    /// Run both channels for one sample.
    pub fn process(&mut self, frame: &mut Frame) {
        // metering button cycles what the meter displays
        let press = frame.metering_button > 0.5;
        if press && !self.metering_high {
            self.settings.monitor_mode = self.settings.monitor_mode.next();
        }
        self.metering_high = press;

        // function buttons cycle modes; linked mirrors a press onto both
        let e1 = self.ch[0].poll_button(frame.ch1.function_button);
        let e2 = self.ch[1].poll_button(frame.ch2.function_button);
        if self.settings.linked {
            if e1 || e2 {
                self.ch[0].cycle_mode();
                self.ch[1].cycle_mode();
            }
        } else {
            if e1 {
                self.ch[0].cycle_mode();
            }
            if e2 {
                self.ch[1].cycle_mode();
            }
        }
        for i in 0..2 {
            self.settings.function[i] = self.ch[i].function();
            self.settings.alternate[i] = self.ch[i].alternate();
        }

        let monitor = self.settings.monitor_mode;
        let u1 = self.ch[0].process(&mut frame.ch1, monitor);
        let u2 = self.ch[1].process(&mut frame.ch2, monitor);
        frame.lights_updated = u1 || u2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MonitorMode, ProcessorFunction};

    fn pressed_frame(ch1: bool, ch2: bool) -> Frame {
        let mut f = Frame::default();
        f.ch1.function_button = if ch1 { 1.0 } else { 0.0 };
        f.ch2.function_button = if ch2 { 1.0 } else { 0.0 };
        f
    }

    #[test]
    fn apply_settings_is_idempotent() {
        let mut s = UiSettings::default();
        s.function = [ProcessorFunction::Compressor, ProcessorFunction::Vactrol];
        s.alternate = [true, false];

        let mut once = Engine::new(0);
        once.apply_settings(&s);
        let mut twice = Engine::new(0);
        twice.apply_settings(&s);
        twice.apply_settings(&s);

        let mut fa = Frame::default();
        fa.ch1.signal_in = 3.0;
        fa.ch1.signal_in_connected = true;
        fa.ch1.excite_in = 5.0;
        let mut fb = fa;
        for _ in 0..1000 {
            once.process(&mut fa);
            twice.process(&mut fb);
            assert_eq!(fa.ch1.signal_out, fb.ch1.signal_out);
            assert_eq!(fa.ch2.signal_out, fb.ch2.signal_out);
        }
        assert_eq!(*once.ui_settings(), *twice.ui_settings());
    }

    #[test]
    fn unlinked_buttons_cycle_independently() {
        let mut e = Engine::new(0);
        let mut f = pressed_frame(true, false);
        e.process(&mut f);
        assert!(e.ui_settings().alternate[0]);
        assert!(!e.ui_settings().alternate[1]);
    }

    #[test]
    fn linked_button_mirrors_cycle() {
        let mut e = Engine::new(0);
        let mut s = *e.ui_settings();
        s.linked = true;
        e.apply_settings(&s);
        let mut f = pressed_frame(true, false);
        e.process(&mut f);
        assert!(e.ui_settings().alternate[0]);
        assert!(e.ui_settings().alternate[1]);
        // release, then press the other button: both advance again
        e.process(&mut Frame::default());
        let mut f = pressed_frame(false, true);
        e.process(&mut f);
        assert_eq!(e.ui_settings().function[0], ProcessorFunction::Vactrol);
        assert_eq!(e.ui_settings().function[1], ProcessorFunction::Vactrol);
    }

    #[test]
    fn metering_button_cycles_monitor_mode() {
        let mut e = Engine::new(0);
        let mut f = Frame::default();
        f.metering_button = 1.0;
        e.process(&mut f);
        assert_eq!(e.ui_settings().monitor_mode, MonitorMode::VcaCv);
        // held: no further advance
        e.process(&mut f);
        assert_eq!(e.ui_settings().monitor_mode, MonitorMode::VcaCv);
        f.metering_button = 0.0;
        e.process(&mut f);
        f.metering_button = 1.0;
        e.process(&mut f);
        assert_eq!(e.ui_settings().monitor_mode, MonitorMode::AudioIn);
    }

    #[test]
    fn sync_ui_copies_settings_not_audio_state() {
        let mut a = Engine::new(0);
        let mut sa = *a.ui_settings();
        sa.function = [ProcessorFunction::Compressor, ProcessorFunction::Follower];
        sa.monitor_mode = MonitorMode::Output;
        sa.linked = true;
        a.apply_settings(&sa);

        let mut b = Engine::new(1);
        let mut f = Frame::default();
        f.ch1.excite_in = 6.0;
        f.ch1.signal_in = 2.0;
        f.ch1.signal_in_connected = true;
        for _ in 0..2000 {
            b.process(&mut f);
        }
        let state_before = b.ch[0].state().clone();
        b.sync_ui(&a);
        assert_eq!(*b.ui_settings(), sa);
        assert_eq!(*b.ch[0].state(), state_before);
    }

    #[test]
    fn randomize_preserves_function_and_bounds() {
        let mut e = Engine::new(3);
        let s = *e.ui_settings();
        e.randomize();
        assert_eq!(*e.ui_settings(), s);
        for ch in &e.ch {
            let st = ch.state();
            assert!((0.0..=1.0).contains(&st.env_level));
            assert!((0.0..=1.0).contains(&st.follow_level));
            assert!(st.lorenz.iter().all(|v| v.abs() <= 40.0));
        }
    }

    #[test]
    fn randomize_is_deterministic_per_voice() {
        let mut a = Engine::new(5);
        let mut b = Engine::new(5);
        a.randomize();
        b.randomize();
        assert_eq!(a.ch[0].state(), b.ch[0].state());
        assert_eq!(a.ch[1].state(), b.ch[1].state());
    }
}
