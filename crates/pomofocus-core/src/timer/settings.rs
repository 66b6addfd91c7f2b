//! Timer settings: durations, long-break cadence, auto-start and sound.
//!
//! All durations are in seconds. The engine only reads these; the
//! configuration layer owns them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u64,
    #[serde(default = "default_short_break")]
    pub short_break_duration: u64,
    #[serde(default = "default_long_break")]
    pub long_break_duration: u64,
    /// Every Nth completed focus session is followed by a long break.
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    #[serde(default)]
    pub auto_start_breaks: bool,
    #[serde(default)]
    pub auto_start_focus: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    /// 0..=100
    #[serde(default = "default_volume")]
    pub sound_volume: u8,
    /// Focus sessions per day the user aims for.
    #[serde(default = "default_daily_goal")]
    pub daily_goal: u32,
}

fn default_focus_duration() -> u64 {
    25 * 60
}
fn default_short_break() -> u64 {
    5 * 60
}
fn default_long_break() -> u64 {
    15 * 60
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_true() -> bool {
    true
}
fn default_volume() -> u8 {
    50
}
fn default_daily_goal() -> u32 {
    8
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            short_break_duration: default_short_break(),
            long_break_duration: default_long_break(),
            long_break_interval: default_long_break_interval(),
            auto_start_breaks: false,
            auto_start_focus: false,
            sound_enabled: true,
            sound_volume: default_volume(),
            daily_goal: default_daily_goal(),
        }
    }
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

impl TimerSettings {
    /// Reject values the settings form would never accept.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("focus_duration", self.focus_duration as i64, 60, 7200)?;
        check_range("short_break_duration", self.short_break_duration as i64, 60, 3600)?;
        check_range("long_break_duration", self.long_break_duration as i64, 60, 7200)?;
        check_range("long_break_interval", self.long_break_interval as i64, 1, 10)?;
        check_range("sound_volume", self.sound_volume as i64, 0, 100)?;
        check_range("daily_goal", self.daily_goal as i64, 1, 20)?;
        Ok(())
    }

    /// Whether finishing a session of `finished` should start the next one
    /// without user input.
    pub fn auto_start_after(&self, finished: super::TimerMode) -> bool {
        if finished.is_break() {
            self.auto_start_focus
        } else {
            self.auto_start_breaks
        }
    }
}
