//! Orchestrates a single invocation: `spec.md §4.6`'s seven steps.

use crate::{
    cache::{CacheStore, RunResult},
    env_resolver::{self, EnvRuleSet},
    error::Error,
    exec::{self, Invocation},
    fingerprint::{self, Cacheable},
    recorder, replay,
};
use std::{
    collections::BTreeMap,
    io::{self, Read},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Everything the controller needs for one invocation, already parsed out
/// of the CLI surface.
pub struct RunConfig {
    pub command: Vec<String>,
    pub rules: EnvRuleSet,
    pub include_stdin: bool,
    pub shell: bool,
    pub shlex_quote: bool,
    pub strip_colors: bool,
    pub ttl: Duration,
    pub keep_failures: bool,
}

/// Read stdin to EOF if `config.include_stdin`; otherwise `None`.
fn maybe_read_stdin(include_stdin: bool) -> Result<Option<Vec<u8>>, Error> {
    if !include_stdin {
        return Ok(None);
    }
    let mut buf = Vec::new();
    io::stdin()
        .read_to_end(&mut buf)
        .map_err(Error::StdinReadFailed)?;
    Ok(Some(buf))
}

/// Run `config` against `store`, replaying a fresh cache hit or spawning
/// and recording a fresh run, and return the exit code to propagate.
pub fn run(
    config: &RunConfig,
    store: &CacheStore,
    process_env: &BTreeMap<String, String>,
) -> Result<i32, Error> {
    if config.command.is_empty() {
        return Err(Error::NoCommand);
    }

    // Step 1: resolve environment. TERM injection is PTY-mode-only
    // (`spec.md §4.1`); PTY mode is not implemented (see DESIGN.md), so
    // `term` is always `None` here.
    let shell_value = process_env.get("SHELL").map(String::as_str);
    let (envs_for_cache, envs_for_passthru) = env_resolver::resolve(
        process_env,
        &config.rules,
        config.shell.then_some(shell_value.unwrap_or("/bin/sh")),
        None,
    );

    // Step 2: read stdin to EOF if it participates in the key.
    let input = maybe_read_stdin(config.include_stdin)?;

    // Step 3: build RunConfig, derive Fingerprint.
    let cacheable = Cacheable {
        command: &config.command,
        envs_for_cache: &envs_for_cache,
        input: input.as_deref(),
        shell: config.shell,
        shlex_quote: config.shlex_quote,
    };
    let fp = fingerprint::derive(&cacheable);

    // Step 4: look up; replay on a fresh hit.
    if let Some(recording) = store.get(fp) {
        let now = SystemTime::now();
        if CacheStore::is_fresh(&recording.result, config.ttl, now) {
            log::info!(
                "using cached result for {} from {}",
                config.command.join(" "),
                recording.result.started_at
            );
            let code = replay::replay(
                &recording,
                config.strip_colors,
                io::stdout(),
                io::stderr(),
            );
            return Ok(code);
        }
    }

    // Step 5: spawn, live-tee + record, await termination.
    let mut env = envs_for_cache.clone();
    env.extend(envs_for_passthru.clone());

    let invocation = Invocation {
        command: &config.command,
        env: &env,
        input: input.as_deref(),
        shell: config.shell,
        shlex_quote: config.shlex_quote,
        shell_path: shell_value.filter(|_| config.shell),
    };
    let started_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut running = exec::spawn(&invocation)?;
    // Arm SIGINT forwarding before the capture suspension point below:
    // spec.md §5 names "awaiting either-stream output during capture" as
    // its own cancellation suspension point, so the handler must already
    // be live here, not only around the final `exec::wait`.
    exec::arm_sigint_forwarding(running.handle.group());

    let stdout = running
        .handle
        .stdout()
        .map_err(|e| Error::ChildSpawnFailed(crate::error::HandleErrorOrSpawn::Handle(e)))?;
    let stderr = running
        .handle
        .stderr()
        .map_err(|e| Error::ChildSpawnFailed(crate::error::HandleErrorOrSpawn::Handle(e)))?;
    let captured = recorder::capture(stdout, stderr, io::stdout(), io::stderr());

    let status = exec::wait(running)?;
    let return_code = exec::exit_code(status);

    // Step 6: persist if successful or `keep_failures`.
    if return_code == 0 || config.keep_failures {
        let result = RunResult {
            started_at,
            return_code,
            chunks: captured.chunk_lengths,
        };
        store.put(fp, &result, &captured.data);
    }

    // Step 7.
    Ok(return_code)
}
