mod chime;
mod clock;
mod elapsed;
mod engine;
mod mode;
mod runner;
mod settings;

pub use chime::{Chime, SilentChime};
pub use clock::{Clock, ManualClock, SystemClock};
pub use elapsed::ElapsedTracker;
pub use engine::{EngineOptions, TimerEngine, TimerSnapshot};
pub use mode::{TimerMode, TimerStatus};
pub use runner::TimerRunner;
pub use settings::TimerSettings;
