//! Shared UI settings and mode tables.
//!
//! Every polyphonic voice of one module holds an identical copy of
//! `UiSettings`. Changes are computed once and broadcast to all voices;
//! no voice ever applies a settings delta on its own.

use serde::{Deserialize, Serialize};

/// Selectable processing function per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorFunction {
    #[default]
    Envelope,
    Vactrol,
    Follower,
    Compressor,
    FilterController,
    LorenzGenerator,
}

pub const NUM_FUNCTIONS: usize = 6;

impl ProcessorFunction {
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => ProcessorFunction::Vactrol,
            2 => ProcessorFunction::Follower,
            3 => ProcessorFunction::Compressor,
            4 => ProcessorFunction::FilterController,
            5 => ProcessorFunction::LorenzGenerator,
            _ => ProcessorFunction::Envelope,
        }
    }

    pub fn index(self) -> i64 {
        match self {
            ProcessorFunction::Envelope => 0,
            ProcessorFunction::Vactrol => 1,
            ProcessorFunction::Follower => 2,
            ProcessorFunction::Compressor => 3,
            ProcessorFunction::FilterController => 4,
            ProcessorFunction::LorenzGenerator => 5,
        }
    }

    /// Successor in the function-button cycle, wrapping after the last.
    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % NUM_FUNCTIONS as i64)
    }
}

/// What the four-segment meter displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorMode {
    #[default]
    ExciteIn,
    VcaCv,
    AudioIn,
    Output,
}

pub const NUM_MONITOR_MODES: usize = 4;

impl MonitorMode {
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => MonitorMode::VcaCv,
            2 => MonitorMode::AudioIn,
            3 => MonitorMode::Output,
            _ => MonitorMode::ExciteIn,
        }
    }

    pub fn index(self) -> i64 {
        match self {
            MonitorMode::ExciteIn => 0,
            MonitorMode::VcaCv => 1,
            MonitorMode::AudioIn => 2,
            MonitorMode::Output => 3,
        }
    }

    /// Successor in the metering-button cycle.
    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % NUM_MONITOR_MODES as i64)
    }
}

/// Per-module configuration shared by all voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UiSettings {
    pub function: [ProcessorFunction; 2],
    pub alternate: [bool; 2],
    pub monitor_mode: MonitorMode,
    pub linked: bool,
}

/// One named (function, variant) combination offered by the menu.
pub struct ChannelMode {
    pub function: ProcessorFunction,
    pub alternate: bool,
    pub label: &'static str,
}

/// Menu table of named channel modes. The function button can also reach
/// the two unnamed combinations by cycling through variants directly.
pub const CHANNEL_MODES: [ChannelMode; 10] = [
    ChannelMode { function: ProcessorFunction::Envelope, alternate: false, label: "Envelope" },
    ChannelMode { function: ProcessorFunction::Vactrol, alternate: false, label: "Vactrol" },
    ChannelMode { function: ProcessorFunction::Follower, alternate: false, label: "Follower" },
    ChannelMode { function: ProcessorFunction::Compressor, alternate: false, label: "Compressor" },
    ChannelMode { function: ProcessorFunction::Envelope, alternate: true, label: "AR envelope" },
    ChannelMode { function: ProcessorFunction::Vactrol, alternate: true, label: "Plucked vactrol" },
    ChannelMode { function: ProcessorFunction::Follower, alternate: true, label: "Cutoff controller" },
    ChannelMode { function: ProcessorFunction::Compressor, alternate: true, label: "Slow compressor" },
    ChannelMode { function: ProcessorFunction::FilterController, alternate: true, label: "Direct VCF controller" },
    ChannelMode { function: ProcessorFunction::LorenzGenerator, alternate: false, label: "Lorenz generator" },
];

/// One named monitor mode.
pub struct MonitorModeEntry {
    pub mode: MonitorMode,
    pub label: &'static str,
}

pub const MONITOR_MODES: [MonitorModeEntry; NUM_MONITOR_MODES] = [
    MonitorModeEntry { mode: MonitorMode::ExciteIn, label: "Excite" },
    MonitorModeEntry { mode: MonitorMode::VcaCv, label: "Level" },
    MonitorModeEntry { mode: MonitorMode::AudioIn, label: "In" },
    MonitorModeEntry { mode: MonitorMode::Output, label: "Out" },
];

/// Flat key -> integer persisted form of `UiSettings`.
///
/// Uses `#[serde(default)]` so sparse settings JSON loads correctly:
/// missing keys get default values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SavedSettings {
    pub function1: i64,
    pub function2: i64,
    pub alternate1: i64,
    pub alternate2: i64,
    pub monitor_mode: i64,
    pub linked: i64,
}

impl From<UiSettings> for SavedSettings {
    fn from(s: UiSettings) -> Self {
        Self {
            function1: s.function[0].index(),
            function2: s.function[1].index(),
            alternate1: s.alternate[0] as i64,
            alternate2: s.alternate[1] as i64,
            monitor_mode: s.monitor_mode.index(),
            linked: s.linked as i64,
        }
    }
}

impl From<SavedSettings> for UiSettings {
    fn from(s: SavedSettings) -> Self {
        Self {
            function: [
                ProcessorFunction::from_index(s.function1),
                ProcessorFunction::from_index(s.function2),
            ],
            alternate: [s.alternate1 != 0, s.alternate2 != 0],
            monitor_mode: MonitorMode::from_index(s.monitor_mode),
            linked: s.linked != 0,
        }
    }
}

impl UiSettings {
    /// Serialize to the flat key -> integer JSON form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&SavedSettings::from(*self)).expect("settings serialize")
    }

    /// Parse from JSON. Missing keys default; malformed input falls back
    /// to default settings entirely.
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str::<SavedSettings>(json)
            .map(UiSettings::from)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_cycle_wraps() {
        let mut f = ProcessorFunction::Envelope;
        for _ in 0..NUM_FUNCTIONS {
            f = f.next();
        }
        assert_eq!(f, ProcessorFunction::Envelope);
        assert_eq!(ProcessorFunction::LorenzGenerator.next(), ProcessorFunction::Envelope);
    }

    #[test]
    fn monitor_cycle_wraps() {
        assert_eq!(MonitorMode::Output.next(), MonitorMode::ExciteIn);
        assert_eq!(MonitorMode::ExciteIn.next(), MonitorMode::VcaCv);
    }

    #[test]
    fn mode_table_covers_all_functions() {
        for f in 0..NUM_FUNCTIONS as i64 {
            let f = ProcessorFunction::from_index(f);
            assert!(CHANNEL_MODES.iter().any(|m| m.function == f));
        }
        assert_eq!(CHANNEL_MODES.len(), 10);
        assert_eq!(MONITOR_MODES.len(), 4);
    }

    #[test]
    fn sparse_json_load() {
        let s = UiSettings::from_json(r#"{"function1": 1, "alternate1": 0, "monitor_mode": 2, "linked": 1}"#);
        assert_eq!(s.function[0], ProcessorFunction::Vactrol);
        assert!(!s.alternate[0]);
        assert_eq!(s.monitor_mode, MonitorMode::AudioIn);
        assert!(s.linked);
        // Missing keys stay at defaults
        assert_eq!(s.function[1], ProcessorFunction::Envelope);
        assert!(!s.alternate[1]);
    }

    #[test]
    fn json_roundtrip() {
        let mut s = UiSettings::default();
        s.function = [ProcessorFunction::Compressor, ProcessorFunction::LorenzGenerator];
        s.alternate = [true, false];
        s.monitor_mode = MonitorMode::Output;
        s.linked = true;
        assert_eq!(UiSettings::from_json(&s.to_json()), s);
    }

    #[test]
    fn malformed_json_defaults() {
        assert_eq!(UiSettings::from_json("not json"), UiSettings::default());
        assert_eq!(UiSettings::from_json("{}"), UiSettings::default());
    }
}
