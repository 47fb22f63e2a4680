use std::{env, env::VarError};

const HELP: &str = include_str!("./cli-help.txt");

/// Variables shown by `--help`. `LOYALTY_DATABASE_URL` can carry credentials, so it is not listed.
const DISPLAY_ENVS: [&str; 9] = [
    "RUST_LOG",
    "LOYALTY_ACCRUAL_ADDRESS",
    "LOYALTY_ACCRUAL_WORKERS",
    "LOYALTY_QUEUE_CAPACITY",
    "LOYALTY_DISCOVERY_INTERVAL_MS",
    "LOYALTY_RATE_LIMIT_FALLBACK_SECS",
    "LOYALTY_ACCRUAL_TIMEOUT_SECS",
    "LOYALTY_RUN_MIGRATIONS",
    "LOYALTY_SHUTDOWN_TIMEOUT_SECS",
];

/// The worker takes no arguments. If any are given, prints the help text and the current configuration and returns
/// `true`, in which case the caller should exit.
pub fn handle_command_line_args() -> bool {
    if env::args().len() <= 1 {
        return false;
    }
    println!("\n{HELP}\n");
    println!("Current environment values (EXCLUDING variables that contain secrets):");
    for name in DISPLAY_ENVS {
        println!("  {name:<35} {}", display_value(env::var(name)));
    }
    true
}

fn display_value(value: Result<String, VarError>) -> String {
    match value {
        Ok(s) => s,
        Err(VarError::NotPresent) => "Not set".into(),
        Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_values_are_reported() {
        assert_eq!(display_value(Err(VarError::NotPresent)), "Not set");
        assert_eq!(display_value(Ok("8".into())), "8");
    }

    #[test]
    fn secrets_are_never_displayed() {
        assert!(!DISPLAY_ENVS.contains(&"LOYALTY_DATABASE_URL"));
        for name in DISPLAY_ENVS.iter().skip(1) {
            assert!(HELP.contains(name), "{name} is missing from the help text");
        }
    }
}
