//! Task management commands for CLI.

use clap::Subcommand;
use pomofocus_core::{Config, Database, NewTask};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Estimated pomodoros (default: 1)
        #[arg(long, default_value = "1")]
        estimate: u32,
        /// Credit focus sessions to this task from now on
        #[arg(long)]
        activate: bool,
    },
    /// List tasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// Mark a task as done
    Done {
        /// Task ID
        id: String,
        /// Mark as not done instead
        #[arg(long)]
        undo: bool,
    },
    /// Delete a task. Its sessions are kept.
    Delete {
        /// Task ID
        id: String,
    },
    /// Focus time per task over the last seven days
    Stats,
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TaskAction::Create {
            title,
            description,
            estimate,
            activate,
        } => {
            let task = db.create_task(&NewTask {
                title,
                description,
                estimated_pomodoros: estimate,
            })?;
            if activate {
                let mut config = Config::load()?;
                config.active_task = Some(task.id.clone());
                config.save()?;
            }
            eprintln!("Task created: {}", task.id);
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { all } => {
            let tasks = db.list_tasks(all)?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        TaskAction::Done { id, undo } => {
            let task = db.set_task_completed(&id, !undo)?;
            let mut config = Config::load()?;
            if task.completed && config.active_task.as_deref() == Some(task.id.as_str()) {
                config.active_task = None;
                config.save()?;
            }
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Delete { id } => {
            db.delete_task(&id)?;
            let mut config = Config::load()?;
            if config.active_task.as_deref() == Some(id.as_str()) {
                config.active_task = None;
                config.save()?;
            }
            println!("Task deleted: {id}");
        }
        TaskAction::Stats => {
            let stats = db.task_stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
