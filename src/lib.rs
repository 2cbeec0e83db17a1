//! Executes a command and caches its terminal output, keyed by a
//! fingerprint of the argument vector, selected environment variables,
//! and optionally stdin.

pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod env_resolver;
pub mod error;
pub mod exec;
pub mod fingerprint;
pub mod recorder;
pub mod replay;

use cli::Cli;
use env_resolver::EnvRuleSet;
use error::Error;
use std::{collections::BTreeMap, io::IsTerminal};

/// Parse `cli` into the `controller::RunConfig` it describes, resolving
/// every flag default that depends on ambient state (TTY-ness of stdin
/// and stdout).
pub fn build_run_config(cli: &Cli) -> Result<controller::RunConfig, Error> {
    if cli.command.is_empty() {
        return Err(Error::NoCommand);
    }

    let include = cli::parse_env_args(&cli.include_env, true)?;
    let passthru = cli::parse_env_args(&cli.passthru_env, true)?;
    let exclude = cli::parse_env_args(&cli.exclude_env, false)?;

    Ok(controller::RunConfig {
        command: cli.command.clone(),
        rules: EnvRuleSet {
            include,
            passthru,
            exclude,
        },
        include_stdin: cli.resolve_include_stdin(std::io::stdin().is_terminal()),
        shell: cli.resolve_shell(),
        shlex_quote: cli.resolve_shlex(),
        strip_colors: cli.resolve_strip_colors(std::io::stdout().is_terminal()),
        ttl: cli::parse_ttl(&cli.ttl)?,
        keep_failures: cli.keep_failures,
    })
}

/// Run one invocation end-to-end: build the run config, open the cache
/// store, and dispatch to `controller::run`. Returns the exit code the
/// process should use.
pub fn run(cli: &Cli) -> Result<i32, Error> {
    let root = config::cache_root()?;

    if cli.print_cache_path {
        println!("{}", root.display());
        return Ok(0);
    }

    let run_config = build_run_config(cli)?;
    let store = cache::CacheStore::new(root);
    let process_env: BTreeMap<String, String> = std::env::vars().collect();
    controller::run(&run_config, &store, &process_env)
}
