use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "TUP_HOST",
        "TUP_PORT",
        "TUP_DATABASE_URL",
        "TUP_USE_X_FORWARDED_FOR",
        "TUP_USE_FORWARDED",
        "TUP_MAX_DELIVERY_ATTEMPTS",
        "TUP_DELIVERY_BACKOFF_SECS",
        "TUP_MAX_CONCURRENT_DELIVERIES",
        "TUP_STRIPE_API_URL",
        "TUP_PAYPAL_API_URL",
        "TUP_COINBASE_API_URL",
        "TUP_DELIVERY_API_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
