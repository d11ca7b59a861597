//! Two-channel dynamics/envelope processor engine.
//!
//! Emulates a hardware dynamics module: per-sample control voltages and
//! audio in, one of six selectable processing functions per channel
//! (envelope, vactrol, follower, compressor, filter controller, Lorenz
//! generator, each with a normal and an alternate variant), audio out
//! plus four-segment bicolor meter state. Up to 16 polyphonic voices run
//! under one shared configuration; voices that become active inherit the
//! current settings from voice 0.
//!
//! The processing core allocates nothing, performs no I/O, and runs in
//! bounded time per sample; it is driven synchronously from the host's
//! audio callback.

pub mod engine;
pub mod functions;
pub mod processor;
pub mod settings;
pub mod smoothing;
pub mod voices;

pub use engine::{ChannelFrame, Engine, Frame};
pub use functions::{AUDIO_VOLTS, CV_VOLTS, RAIL_VOLTS};
pub use settings::{
    ChannelMode, MonitorMode, ProcessorFunction, UiSettings, CHANNEL_MODES, MONITOR_MODES,
};
pub use voices::{light_index, EngineBank, NUM_ENGINES, NUM_LIGHTS};
