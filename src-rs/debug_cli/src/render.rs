use std::io::{self, Write};

use crate::models::{CLIConfig, HistoryInfo, TaskInfo, TaskList};

pub fn banner(cfg: &CLIConfig) {
    println!("NEXUS Debug CLI");
    println!("API: {}", cfg.base_url);
    println!("Type a development goal to generate tasks, or /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                         Show commands");
    println!("  /exit | /quit                 Exit");
    println!("  /tasks [status=..] [category=..] [text]");
    println!("                                List tasks (use _ for spaces in values)");
    println!("  /accept <id>                  Accept an awaiting task");
    println!("  /reject <id>                  Reject an awaiting task");
    println!("  /status <id> <status>         Force a task status");
    println!("  /history                      Show prompt history");
    println!("  /restore <history id>         Re-run a previous prompt");
    println!("  /clear                        Clear prompt history");
    println!("  /config                       Show current config");
    println!("  /base <url>                   Update base URL");
    println!("  /debug                        Toggle metrics output");
}

pub fn task(task: &TaskInfo) {
    println!(
        "[{}] {} ({:.0}%, {}) {}",
        task.status, task.id, task.confidence, task.category, task.title
    );
}

pub fn tasks(tasks: &[TaskInfo]) {
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    for item in tasks {
        task(item);
    }
}

pub fn task_list(list: &TaskList, debug: bool) {
    tasks(&list.tasks);
    println!("showing {} of {}", list.tasks.len(), list.total);
    if !debug {
        return;
    }
    match &list.metrics {
        Some(metrics) => {
            println!("average confidence: {:.1}", metrics.confidence_average);
            for (status, count) in &metrics.by_status {
                println!("  {}: {}", status, count);
            }
        }
        None => println!("no metrics"),
    }
}

pub fn history(items: &[HistoryInfo]) {
    if items.is_empty() {
        println!("no history");
        return;
    }
    for item in items {
        let detail = match (&item.tasks, &item.error_message) {
            (Some(tasks), _) => format!("{} tasks", tasks.len()),
            (None, Some(message)) => message.clone(),
            (None, None) => String::new(),
        };
        println!(
            "{} [{}] {} {:?} {}",
            item.id, item.status, item.created_at, item.prompt, detail
        );
    }
}

pub fn config(cfg: &CLIConfig) {
    println!("config:");
    println!("  base: {}", cfg.base_url);
    println!("  debug: {}", cfg.debug);
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}
