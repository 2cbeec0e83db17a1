//! Spawns the child command and awaits its exit, forwarding SIGINT to its
//! process group: `spec.md §4.3`'s spawn contract and §5's cancellation
//! model.

use crate::error::{Error, HandleErrorOrSpawn};
use signal_hook::{consts::SIGINT, iterator::Signals};
use spawn::{Spawner, StreamMode};
use std::{
    collections::BTreeMap,
    os::unix::process::ExitStatusExt,
    process::ExitStatus,
    thread,
};

/// What to run and how, already resolved by the controller:
/// direct-exec vs `$SHELL -c`, the exact (non-inherited) child
/// environment, and the stdin payload.
pub struct Invocation<'a> {
    pub command: &'a [String],
    pub env: &'a BTreeMap<String, String>,
    pub input: Option<&'a [u8]>,
    pub shell: bool,
    pub shlex_quote: bool,
    pub shell_path: Option<&'a str>,
}

/// A spawned child, with its stdio piped and ready for `recorder::capture`.
pub struct Running {
    pub handle: spawn::Handle,
}

/// Build the argv for shell mode: `$SHELL -c <joined>`, where `<joined>`
/// is shell-quote-joined if `shlex_quote`, else space-joined
/// (`spec.md §4.3`).
pub fn join_for_shell(command: &[String], shlex_quote: bool) -> String {
    if shlex_quote {
        command.iter().map(|s| shell_quote(s)).collect::<Vec<_>>().join(" ")
    } else {
        command.join(" ")
    }
}

/// POSIX single-quote a token: wrap in `'...'`, escaping embedded `'` as
/// `'\''`. Always quotes, even when unnecessary, which is what a
/// conservative re-quoter should do (`spec.md §9`'s `shlex` doc note:
/// "you may need to embed additional quoting").
fn shell_quote(token: &str) -> String {
    let mut out = String::with_capacity(token.len() + 2);
    out.push('\'');
    for ch in token.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Resolve `$SHELL`, falling back to `/bin/sh` (Open Question iii).
pub fn resolve_shell(env_shell: Option<&str>) -> Result<String, Error> {
    let candidate = env_shell
        .map(str::to_string)
        .or_else(|| std::env::var("SHELL").ok())
        .unwrap_or_else(|| "/bin/sh".to_string());

    which::which(&candidate)
        .map(|p| p.to_string_lossy().into_owned())
        .map_err(|_| {
            Error::ChildSpawnFailed(HandleErrorOrSpawn::Which(candidate))
        })
}

/// Spawn the child described by `invocation`.
pub fn spawn(invocation: &Invocation<'_>) -> Result<Running, Error> {
    let (program, args): (String, Vec<String>) = if invocation.shell {
        let shell = resolve_shell(invocation.shell_path)?;
        let joined = join_for_shell(invocation.command, invocation.shlex_quote);
        (shell, vec!["-c".to_string(), joined])
    } else {
        let program = invocation
            .command
            .first()
            .cloned()
            .ok_or(Error::NoCommand)?;
        (program, invocation.command[1..].to_vec())
    };

    let stdin_mode = match invocation.input {
        None => StreamMode::Null,
        Some(bytes) => StreamMode::Piped(bytes.to_vec()),
    };

    let handle = Spawner::new(program)
        .args(args)
        .envs(invocation.env.iter().map(|(k, v)| (k.clone(), v.clone())))
        .stdin(stdin_mode)
        .spawn()
        .map_err(|e| Error::ChildSpawnFailed(HandleErrorOrSpawn::Spawn(e)))?;

    Ok(Running { handle })
}

/// Arm SIGINT forwarding for `group`: install the watcher thread that
/// forwards a SIGINT received by the parent to the child's process
/// group.
///
/// Must be called right after `spawn` succeeds and before any
/// suspension point that can block on the child (capture, wait): spec.md
/// §5 names "awaiting either-stream output during capture" as a
/// cancellation suspension point in its own right, so the handler has to
/// be live for the whole capture+wait window, not just the final wait.
///
/// A watcher thread blocks on `Signals::forever`, which only yields once
/// a `SIGINT` actually arrives; it is left running past the return of
/// this function (the process exits shortly after regardless) rather
/// than torn down explicitly, matching `signal_hook`'s own "register once
/// per process" idiom.
pub fn arm_sigint_forwarding(group: spawn::ProcessGroup) {
    let mut signals = Signals::new([SIGINT]).expect("failed to register SIGINT handler");

    thread::spawn(move || {
        for _ in signals.forever() {
            let _ = group.signal(nix::sys::signal::Signal::SIGINT);
            break;
        }
    });
}

/// Block until `running`'s child exits. Call only after
/// `arm_sigint_forwarding` so a SIGINT during the wait is forwarded
/// rather than killing the parent outright.
pub fn wait(running: Running) -> Result<ExitStatus, Error> {
    running
        .handle
        .wait()
        .map_err(|e| Error::ChildSpawnFailed(HandleErrorOrSpawn::Handle(e)))
}

/// Map an `ExitStatus` to the integer `return_code` spec.md's `RunResult`
/// stores: the exit code directly, or `128 + signal` on signal
/// termination (`spec.md §4.3`, "Signal termination is encoded per host
/// convention").
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_join_concatenates_with_single_spaces() {
        let command = vec!["echo".to_string(), "foo bar".to_string()];
        assert_eq!(join_for_shell(&command, false), "echo foo bar");
    }

    #[test]
    fn shlex_quote_wraps_each_token() {
        let command = vec!["echo".to_string(), "foo bar".to_string()];
        assert_eq!(join_for_shell(&command, true), "'echo' 'foo bar'");
    }

    #[test]
    fn shlex_quote_escapes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
