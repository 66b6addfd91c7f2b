use clap::Subcommand;
use pomofocus_core::Database;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Most recent sessions first
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Attach a note to a recorded session
    Note {
        /// Session ID
        id: String,
        /// Note text
        text: String,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        SessionAction::List { limit } => {
            let sessions = db.recent_sessions(limit)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionAction::Note { id, text } => {
            db.set_session_notes(&id, &text)?;
            println!("ok");
        }
    }
    Ok(())
}
