/// Completion sound. Failures are logged by the engine and otherwise ignored.
pub trait Chime: Send + Sync {
    /// `volume` is 0..=100.
    fn play(&self, volume: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentChime;

impl Chime for SilentChime {
    fn play(&self, _volume: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
