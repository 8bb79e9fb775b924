use std::env;

use crate::models::CLIConfig;

const DEFAULT_URL: &str = "http://localhost:3001";

pub fn parse_config() -> CLIConfig {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args(
        CLIConfig {
            base_url: env_or("NEXUS_URL", DEFAULT_URL.to_string()),
            debug: env_bool("NEXUS_DEBUG", false),
        },
        &args,
    )
}

fn parse_args(mut cfg: CLIConfig, args: &[String]) -> CLIConfig {
    let mut idx = 0;
    while idx < args.len() {
        match args[idx].as_str() {
            "--base" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.base_url = value.clone();
                    idx += 1;
                }
            }
            "--debug" => {
                if let Some(value) = args.get(idx + 1) {
                    if value.starts_with('-') {
                        cfg.debug = true;
                    } else if let Ok(parsed) = value.parse::<bool>() {
                        cfg.debug = parsed;
                        idx += 1;
                    } else {
                        cfg.debug = true;
                    }
                } else {
                    cfg.debug = true;
                }
            }
            _ => {}
        }
        idx += 1;
    }
    cfg
}

fn env_or(key: &str, fallback: String) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => fallback,
    }
}

fn env_bool(key: &str, fallback: bool) -> bool {
    match env::var(key) {
        Ok(value) => value.parse::<bool>().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CLIConfig {
        CLIConfig {
            base_url: DEFAULT_URL.to_string(),
            debug: false,
        }
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn base_flag_overrides_url() {
        let cfg = parse_args(base(), &args(&["--base", "http://nexus:9000"]));
        assert_eq!(cfg.base_url, "http://nexus:9000");
        assert!(!cfg.debug);
    }

    #[test]
    fn bare_debug_flag_turns_debug_on() {
        assert!(parse_args(base(), &args(&["--debug"])).debug);
        assert!(parse_args(base(), &args(&["--debug", "--base", "x"])).debug);
        assert!(!parse_args(base(), &args(&["--debug", "false"])).debug);
    }
}
