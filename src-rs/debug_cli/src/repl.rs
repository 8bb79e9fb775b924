use std::io;

use crate::client::HTTPClient;
use crate::models::CLIConfig;
use crate::render;

pub struct REPL {
    pub config: CLIConfig,
    pub client: HTTPClient,
}

impl REPL {
    pub fn new(config: CLIConfig, client: HTTPClient) -> Self {
        Self { config, client }
    }

    pub fn run(&mut self) {
        render::banner(&self.config);
        loop {
            render::prompt();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                if self.handle_command(&line) {
                    break;
                }
                continue;
            }
            self.generate(&line);
        }
    }

    fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "tasks" => match self.client.list_tasks(&parse_task_query(rest)) {
                Ok(list) => render::task_list(&list, self.config.debug),
                Err(err) => render::error(&err),
            },
            "accept" | "reject" => {
                if rest.is_empty() {
                    render::error(&format!("usage: /{} <task id>", cmd));
                } else {
                    let result = if cmd == "accept" {
                        self.client.accept(rest)
                    } else {
                        self.client.reject(rest)
                    };
                    match result {
                        Ok(task) => render::task(&task),
                        Err(err) => render::error(&err),
                    }
                }
            }
            "status" => match rest.split_once(' ') {
                Some((id, status)) => match self.client.set_status(id.trim(), status.trim()) {
                    Ok(task) => render::task(&task),
                    Err(err) => render::error(&err),
                },
                None => render::error("usage: /status <task id> <status>"),
            },
            "history" => match self.client.history() {
                Ok(items) => render::history(&items),
                Err(err) => render::error(&err),
            },
            "restore" => {
                if rest.is_empty() {
                    render::error("usage: /restore <history id>");
                } else {
                    match self.client.restore(rest) {
                        Ok(tasks) => render::tasks(&tasks),
                        Err(err) => render::error(&err),
                    }
                }
            }
            "clear" => match self.client.clear_history() {
                Ok(()) => render::info("history cleared"),
                Err(err) => render::error(&err),
            },
            "config" => render::config(&self.config),
            "base" => {
                if rest.is_empty() {
                    render::info(&format!("base: {}", self.config.base_url));
                } else {
                    self.config.base_url = rest.to_string();
                    self.client = HTTPClient::new(&self.config.base_url);
                    render::info("base url updated");
                }
            }
            "debug" => {
                self.config.debug = !self.config.debug;
                render::info(&format!("debug: {}", self.config.debug));
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    fn generate(&mut self, prompt: &str) {
        render::info("generating...");
        match self.client.generate(prompt) {
            Ok(tasks) => render::tasks(&tasks),
            Err(err) => render::error(&err),
        }
    }
}

/// `status=..` and `category=..` words become filters; everything else is
/// joined into the search text.
fn parse_task_query(rest: &str) -> Vec<(String, String)> {
    let mut query = Vec::new();
    let mut search = Vec::new();
    for word in rest.split_whitespace() {
        match word.split_once('=') {
            Some((key, value)) if key == "status" || key == "category" => {
                query.push((key.to_string(), value.replace('_', " ")));
            }
            _ => search.push(word),
        }
    }
    if !search.is_empty() {
        query.push(("search".to_string(), search.join(" ")));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn empty_query_has_no_filters() {
        assert!(parse_task_query("").is_empty());
    }

    #[test]
    fn filters_and_search_are_split() {
        let query = parse_task_query("status=Awaiting_Approval login page category=Frontend");
        assert_eq!(
            query,
            vec![
                pair("status", "Awaiting Approval"),
                pair("category", "Frontend"),
                pair("search", "login page"),
            ]
        );
    }

    #[test]
    fn unknown_keys_are_search_text() {
        assert_eq!(parse_task_query("owner=me"), vec![pair("search", "owner=me")]);
    }
}
