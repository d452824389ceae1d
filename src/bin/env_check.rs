//! env-check - configuration validation tool
//!
//! Checks every ATRIUM_* environment variable plus the effective merged
//! configuration and prints what is wrong. Exits 1 on any invalid or
//! missing value, 0 when the configuration is usable.
//!
//! Usage: env-check [config.yml]

use std::path::Path;

use atrium::config::{CacheDriver, Config};

fn main() {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yml".to_string());

    let mut problems: Vec<String> = Vec::new();

    check_parseable_u16("ATRIUM_SERVER_PORT", &mut problems);
    check_parseable_u64("ATRIUM_CACHE_TTL_SECONDS", &mut problems);
    check_positive_i64("ATRIUM_AUTH_SESSION_DAYS", &mut problems);
    check_one_of(
        "ATRIUM_DATABASE_DRIVER",
        &["sqlite", "mysql"],
        &mut problems,
    );
    check_one_of("ATRIUM_CACHE_DRIVER", &["memory", "redis"], &mut problems);
    check_non_empty("ATRIUM_DATABASE_URL", &mut problems);
    check_non_empty("ATRIUM_CACHE_REDIS_URL", &mut problems);
    check_non_empty("ATRIUM_UPLOAD_PATH", &mut problems);

    // The merged configuration must also load and make sense as a whole
    match Config::load_with_env(Path::new(&config_path)) {
        Ok(config) => {
            if config.database.url.trim().is_empty() {
                problems.push("database.url is empty".to_string());
            }
            if config.cache.driver == CacheDriver::Redis && config.cache.redis_url.is_none() {
                problems.push(
                    "cache.driver is 'redis' but no redis_url is configured \
                     (set ATRIUM_CACHE_REDIS_URL)"
                        .to_string(),
                );
            }
            if config.cache.ttl_seconds == 0 {
                problems.push("cache.ttl_seconds must be greater than zero".to_string());
            }
            if config.auth.session_days <= 0 {
                problems.push("auth.session_days must be greater than zero".to_string());
            }
            if config.upload.max_file_size == 0 {
                problems.push("upload.max_file_size must be greater than zero".to_string());
            }
        }
        Err(err) => {
            problems.push(format!("configuration failed to load: {:#}", err));
        }
    }

    if problems.is_empty() {
        println!("Configuration OK");
        return;
    }

    eprintln!("Configuration problems found:");
    for problem in &problems {
        eprintln!("  - {}", problem);
    }
    std::process::exit(1);
}

fn check_parseable_u16(name: &str, problems: &mut Vec<String>) {
    if let Ok(value) = std::env::var(name) {
        if value.parse::<u16>().is_err() {
            problems.push(format!("{} is not a valid port: '{}'", name, value));
        }
    }
}

fn check_parseable_u64(name: &str, problems: &mut Vec<String>) {
    if let Ok(value) = std::env::var(name) {
        if value.parse::<u64>().is_err() {
            problems.push(format!("{} is not a valid number: '{}'", name, value));
        }
    }
}

fn check_positive_i64(name: &str, problems: &mut Vec<String>) {
    if let Ok(value) = std::env::var(name) {
        match value.parse::<i64>() {
            Ok(n) if n > 0 => {}
            _ => problems.push(format!("{} must be a positive number: '{}'", name, value)),
        }
    }
}

fn check_one_of(name: &str, allowed: &[&str], problems: &mut Vec<String>) {
    if let Ok(value) = std::env::var(name) {
        if !allowed.contains(&value.to_lowercase().as_str()) {
            problems.push(format!(
                "{} must be one of {:?}, got '{}'",
                name, allowed, value
            ));
        }
    }
}

fn check_non_empty(name: &str, problems: &mut Vec<String>) {
    if let Ok(value) = std::env::var(name) {
        if value.trim().is_empty() {
            problems.push(format!("{} is set but empty", name));
        }
    }
}
