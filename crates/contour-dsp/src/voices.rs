//! Engine bank: up to 16 polyphonic voices under one configuration.
//!
//! Owns the fixed engine array and the per-voice brightness buffer.
//! Settings changes are computed from engine 0 and broadcast to all 16
//! engines in one pass, so no partially-updated state is ever observable.

use crate::engine::{Engine, Frame};
use crate::settings::{MonitorMode, ProcessorFunction, UiSettings, CHANNEL_MODES, MONITOR_MODES};

pub const NUM_ENGINES: usize = 16;
/// 4 segments x 2 colors x 2 channels.
pub const NUM_LIGHTS: usize = 16;

/// Index of one light: `channel * 8 + segment * 2 + color` with color
/// 0 = green, 1 = red.
pub fn light_index(channel: usize, segment: usize, red: bool) -> usize {
    channel * 8 + segment * 2 + red as usize
}

pub struct EngineBank {
    engines: [Engine; NUM_ENGINES],
    brightness: [[f32; NUM_ENGINES]; NUM_LIGHTS],
    lights: [f32; NUM_LIGHTS],
    active: usize,
    pending_light_update: bool,
}

impl EngineBank {
    pub fn new() -> Self {
        Self {
            engines: core::array::from_fn(Engine::new),
            brightness: [[0.0; NUM_ENGINES]; NUM_LIGHTS],
            lights: [0.0; NUM_LIGHTS],
            active: 1,
            pending_light_update: false,
        }
    }

    pub fn reset(&mut self) {
        for engine in &mut self.engines {
            engine.reset();
        }
        self.brightness = [[0.0; NUM_ENGINES]; NUM_LIGHTS];
        self.lights = [0.0; NUM_LIGHTS];
        self.active = 1;
        self.pending_light_update = false;
    }

    pub fn set_sample_rate(&mut self, rate: f32) {
        for engine in &mut self.engines {
            engine.set_sample_rate(rate);
        }
    }

    pub fn engine(&self, voice: usize) -> &Engine {
        &self.engines[voice]
    }

    pub fn active_channels(&self) -> usize {
        self.active
    }

    /// Track the host's active channel count. On growth, every newly
    /// active voice inherits engine 0's settings before it is ever
    /// processed; shrink leaves inactive engines untouched.
    pub fn set_active_channels(&mut self, count: usize) {
        let count = count.clamp(1, NUM_ENGINES);
        if count > self.active {
            let (first, rest) = self.engines.split_first_mut().expect("fixed array");
            for c in self.active..count {
                rest[c - 1].sync_ui(first);
            }
        }
        self.active = count;
    }

    /// Process one voice for one sample. The caller fills the frame's
    /// per-voice fields; knob fields are shared across voices.
    pub fn process_voice(&mut self, voice: usize, frame: &mut Frame) {
        self.engines[voice].process(frame);
        if frame.lights_updated {
            for seg in 0..4 {
                self.brightness[light_index(0, seg, false)][voice] = frame.ch1.led_green[seg];
                self.brightness[light_index(0, seg, true)][voice] = frame.ch1.led_red[seg];
                self.brightness[light_index(1, seg, false)][voice] = frame.ch2.led_green[seg];
                self.brightness[light_index(1, seg, true)][voice] = frame.ch2.led_red[seg];
            }
            self.pending_light_update = true;
        }
    }

    /// Fold per-voice brightness into the displayed lights: max across
    /// active voices, recomputed only when some voice reported a change.
    pub fn update_lights(&mut self) {
        if !self.pending_light_update {
            return;
        }
        self.pending_light_update = false;
        for i in 0..NUM_LIGHTS {
            let mut brightness = 0.0_f32;
            for c in 0..self.active {
                brightness = brightness.max(self.brightness[i][c]);
            }
            self.lights[i] = brightness;
        }
    }

    /// Displayed brightness, in [0, 1] per light.
    pub fn lights(&self) -> &[f32; NUM_LIGHTS] {
        &self.lights
    }

    fn broadcast(&mut self, settings: UiSettings) {
        for engine in &mut self.engines {
            engine.apply_settings(&settings);
        }
    }

    pub fn toggle_link(&mut self) {
        let mut s = *self.engines[0].ui_settings();
        s.linked = !s.linked;
        self.broadcast(s);
    }

    /// `mode_index` indexes `CHANNEL_MODES`; callers enumerate the table.
    pub fn set_channel_mode(&mut self, channel: usize, mode_index: usize) {
        let mode = &CHANNEL_MODES[mode_index];
        let mut s = *self.engines[0].ui_settings();
        s.function[channel] = mode.function;
        s.alternate[channel] = mode.alternate;
        self.broadcast(s);
    }

    /// `mode_index` indexes `MONITOR_MODES`.
    pub fn set_monitor_mode(&mut self, mode_index: usize) {
        let mut s = *self.engines[0].ui_settings();
        s.monitor_mode = MONITOR_MODES[mode_index].mode;
        self.broadcast(s);
    }

    pub fn function(&self, channel: usize) -> ProcessorFunction {
        self.engines[0].ui_settings().function[channel]
    }

    pub fn alternate(&self, channel: usize) -> bool {
        self.engines[0].ui_settings().alternate[channel]
    }

    pub fn linked(&self) -> bool {
        self.engines[0].ui_settings().linked
    }

    pub fn monitor_mode(&self) -> MonitorMode {
        self.engines[0].ui_settings().monitor_mode
    }

    pub fn save_settings(&self) -> String {
        self.engines[0].ui_settings().to_json()
    }

    /// Missing keys default; malformed input loads default settings.
    pub fn load_settings(&mut self, json: &str) {
        self.broadcast(UiSettings::from_json(json));
    }

    pub fn randomize(&mut self) {
        for engine in &mut self.engines {
            engine.randomize();
        }
    }
}

impl Default for EngineBank {
    fn default() -> Self {
        Self::new()
    }
}
