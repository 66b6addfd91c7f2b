use serde::{Deserialize, Serialize};

use super::settings::TimerSettings;

/// Which duration policy the countdown currently follows.
///
/// Also used as the session kind when a countdown is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::ShortBreak => "short_break",
            TimerMode::LongBreak => "long_break",
        }
    }

    /// Parse a mode name. Accepts the serialized form plus `short`/`long`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "focus" => Some(TimerMode::Focus),
            "short_break" | "short-break" | "short" => Some(TimerMode::ShortBreak),
            "long_break" | "long-break" | "long" => Some(TimerMode::LongBreak),
            _ => None,
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, TimerMode::Focus)
    }

    /// Configured length of this mode in seconds.
    pub fn duration_secs(&self, settings: &TimerSettings) -> u64 {
        match self {
            TimerMode::Focus => settings.focus_duration,
            TimerMode::ShortBreak => settings.short_break_duration,
            TimerMode::LongBreak => settings.long_break_duration,
        }
    }

    /// Mode that follows a natural completion of `self`.
    ///
    /// `completed_before` is the focus count *before* the session that just
    /// finished is counted.
    pub fn next_after_completion(&self, completed_before: u32, long_break_interval: u32) -> Self {
        match self {
            TimerMode::Focus => {
                let next_count = completed_before.saturating_add(1);
                if long_break_interval > 0 && next_count % long_break_interval == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Focus,
        }
    }

    /// Mode that follows a manual skip. Never lands on a long break.
    pub fn next_after_skip(&self) -> Self {
        match self {
            TimerMode::Focus => TimerMode::ShortBreak,
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Focus,
        }
    }
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of the current countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_break_every_fourth_focus() {
        let kinds: Vec<_> = (0..8)
            .map(|done| TimerMode::Focus.next_after_completion(done, 4))
            .collect();
        assert_eq!(kinds[3], TimerMode::LongBreak);
        assert_eq!(kinds[7], TimerMode::LongBreak);
        assert_eq!(
            kinds.iter().filter(|m| **m == TimerMode::ShortBreak).count(),
            6
        );
    }

    #[test]
    fn interval_of_one_always_long() {
        for done in 0..5 {
            assert_eq!(
                TimerMode::Focus.next_after_completion(done, 1),
                TimerMode::LongBreak
            );
        }
    }

    #[test]
    fn breaks_return_to_focus() {
        assert_eq!(TimerMode::ShortBreak.next_after_completion(3, 4), TimerMode::Focus);
        assert_eq!(TimerMode::LongBreak.next_after_completion(3, 4), TimerMode::Focus);
    }

    #[test]
    fn skip_from_focus_is_short_break() {
        assert_eq!(TimerMode::Focus.next_after_skip(), TimerMode::ShortBreak);
        assert_eq!(TimerMode::LongBreak.next_after_skip(), TimerMode::Focus);
    }

    #[test]
    fn parse_accepts_shorthands() {
        assert_eq!(TimerMode::parse("short"), Some(TimerMode::ShortBreak));
        assert_eq!(TimerMode::parse("LONG_BREAK"), Some(TimerMode::LongBreak));
        assert_eq!(TimerMode::parse("nap"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&TimerMode::ShortBreak).unwrap();
        assert_eq!(json, "\"short_break\"");
        let status = serde_json::to_string(&TimerStatus::Paused).unwrap();
        assert_eq!(status, "\"paused\"");
    }
}
