//! Terminal rendering of task events and final results.

use imagegen_core::task::Task;
use imagegen_tasks::events::TaskEvent;

pub fn print_event(event: &TaskEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        TaskEvent::Inserted { task } => {
            println!("[{}] submitted to {} ({})", task.id, task.display_name, task.status);
        }
        TaskEvent::Updated { task, previous } => {
            println!("[{}] {} -> {}", task.id, previous, task.status);
        }
        TaskEvent::Removed { task_id } => println!("[{task_id}] removed"),
    }
    Ok(())
}

pub fn print_summary(tasks: &[Task], json: bool) -> anyhow::Result<()> {
    if json {
        for task in tasks {
            println!("{}", serde_json::to_string(task)?);
        }
        return Ok(());
    }
    for task in tasks {
        let elapsed = task
            .finish_at
            .map(|at| format!("{:.1}s", (at - task.created_at).num_milliseconds() as f64 / 1000.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} {:<10} {:>8}  {}",
            task.id,
            task.status,
            elapsed,
            task.image.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}
