use clap::Subcommand;
use pomofocus_core::{Config, Database, StatsPeriod};
use serde_json::json;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats, with progress toward the daily goal
    Today,
    /// Since Sunday (UTC)
    Week,
    /// Since the first of the month (UTC)
    Month,
    /// All-time stats
    All,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::Today => {
            let stats = db.stats(StatsPeriod::Day)?;
            let goal = Config::load()?.timer.daily_goal;
            let out = json!({
                "stats": stats,
                "daily_goal": goal,
                "goal_progress": stats.goal_progress(goal),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        StatsAction::Week => {
            let stats = db.stats(StatsPeriod::Week)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Month => {
            let stats = db.stats(StatsPeriod::Month)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::All => {
            let stats = db.stats(StatsPeriod::All)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
