//! The flat CLI surface (`spec.md §6`), `EnvArg` token parsing, and the
//! `RUNCACHED_<OPT>`/`RUNCACHED_<OPT>__<CMD>` environment-variable
//! argv-splicing override.

use crate::{env_resolver::EnvArg, error::Error};
use clap::Parser;
use std::time::Duration;

/// `runcached` executes a command and caches its output, keyed by the
/// command and the environment variables named with `-e`.
#[derive(Parser, Debug)]
#[command(name = "runcached", version, about)]
pub struct Cli {
    /// Cache TTL: a plain number of seconds, or `Nd`/`Nh`/`Nm`/`Ns`.
    #[arg(short = 't', long, default_value = "1d")]
    pub ttl: String,

    /// Cache a non-zero exit instead of discarding it after replay.
    #[arg(short = 'F', long)]
    pub keep_failures: bool,

    /// Include stdin in the cache key. Default: included iff stdin is
    /// not a TTY.
    #[arg(short = 'i', long)]
    pub include_stdin: bool,

    /// Exclude stdin from the cache key, overriding `-i` and the default.
    #[arg(short = 'I', long)]
    pub exclude_stdin: bool,

    /// Environment variable names (globs or `NAME=value` assignments,
    /// comma-separated) to include in the cached environment.
    #[arg(short = 'e', long = "include-env", value_delimiter = ',')]
    pub include_env: Vec<String>,

    /// Environment variable names forwarded to the child but excluded
    /// from the cache key.
    #[arg(
        short = 'p',
        long = "passthru-env",
        value_delimiter = ',',
        default_value = "HOME,PATH,TMPDIR"
    )]
    pub passthru_env: Vec<String>,

    /// Environment variable names removed from both the cached and
    /// passthrough sets. Assignments are rejected here.
    #[arg(short = 'E', long = "exclude-env", value_delimiter = ',')]
    pub exclude_env: Vec<String>,

    /// Execute the command through `$SHELL -c` instead of directly.
    #[arg(short = 's', long)]
    pub shell: bool,

    /// Execute the command directly, overriding `-s`.
    #[arg(short = 'S', long = "no-shell")]
    pub no_shell: bool,

    /// POSIX-quote argv tokens when joining for `-s`.
    #[arg(short = 'l', long)]
    pub shlex: bool,

    /// Space-join argv tokens when joining for `-s`, overriding `-l`.
    #[arg(short = 'L', long = "no-shlex")]
    pub no_shlex: bool,

    /// Strip ANSI color codes on replay. Default: on when stdout is not
    /// a TTY.
    #[arg(short = 'C', long = "strip-colors")]
    pub strip_colors: bool,

    /// Keep ANSI color codes on replay, overriding `-C` and the default.
    #[arg(short = 'c', long = "no-strip-colors")]
    pub no_strip_colors: bool,

    /// Suppress informational logging.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase logging verbosity.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print the cache store's directory and exit.
    #[arg(short = 'P', long)]
    pub print_cache_path: bool,

    /// The command to run, and its arguments. A leading `--` is
    /// permitted and stripped by clap's `trailing_var_arg` handling.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Whether stdin should participate in the cache key: `-I` always
    /// wins; otherwise `-i`; otherwise the default (not a TTY).
    pub fn resolve_include_stdin(&self, stdin_is_tty: bool) -> bool {
        if self.exclude_stdin {
            false
        } else if self.include_stdin {
            true
        } else {
            !stdin_is_tty
        }
    }

    /// Whether the command should run through `$SHELL -c`: `-S` always
    /// wins; otherwise `-s`; default false.
    pub fn resolve_shell(&self) -> bool {
        self.shell && !self.no_shell
    }

    /// Whether argv tokens are POSIX-quoted before shell-joining.
    pub fn resolve_shlex(&self) -> bool {
        self.shlex && !self.no_shlex
    }

    /// Whether replay strips ANSI colors: `-c` always wins; otherwise
    /// `-C`; otherwise the default (stdout is not a TTY).
    pub fn resolve_strip_colors(&self, stdout_is_tty: bool) -> bool {
        if self.no_strip_colors {
            false
        } else if self.strip_colors {
            true
        } else {
            !stdout_is_tty
        }
    }
}

/// Parse a duration string: a bare integer (seconds), or `N` followed by
/// one of `d`/`h`/`m`/`s`.
pub fn parse_ttl(text: &str) -> Result<Duration, Error> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let (digits, unit) = text.split_at(text.len().saturating_sub(1));
    let amount: u64 = digits
        .parse()
        .map_err(|_| Error::BadArgument(format!("invalid ttl: {text}")))?;

    let secs = match unit {
        "s" => amount,
        "m" => amount.saturating_mul(60),
        "h" => amount.saturating_mul(3600),
        "d" => amount.saturating_mul(86400),
        _ => return Err(Error::BadArgument(format!("invalid ttl unit: {text}"))),
    };
    Ok(Duration::from_secs(secs))
}

/// Parse one `-e`/`-p`/`-E` token into an `EnvArg`.
///
/// A token containing `=` is an assignment (`NAME=value`); the name
/// portion must then contain no glob metacharacters, since "assignment
/// with a glob is a parse error" (`spec.md §3`). A token with no `=` is a
/// bare glob-or-literal pattern.
pub fn parse_env_arg(token: &str, allow_assignment: bool) -> Result<EnvArg, Error> {
    if let Some((name, value)) = token.split_once('=') {
        if !allow_assignment {
            return Err(Error::BadArgument(format!(
                "assignment not allowed here: {token}"
            )));
        }
        if is_glob(name) {
            return Err(Error::BadArgument(format!(
                "assignment name cannot be a glob: {token}"
            )));
        }
        Ok(EnvArg::assignment(name, value))
    } else {
        Ok(EnvArg::pattern(token))
    }
}

fn is_glob(name: &str) -> bool {
    name.contains(['*', '?', '['])
}

/// Parse a list of raw `-e`/`-p`/`-E` tokens.
pub fn parse_env_args(tokens: &[String], allow_assignment: bool) -> Result<Vec<EnvArg>, Error> {
    tokens
        .iter()
        .map(|t| parse_env_arg(t, allow_assignment))
        .collect()
}

/// The `RUNCACHED_` prefix used by the environment-variable flag
/// override (`spec.md §6`).
const OVERRIDE_PREFIX: &str = "RUNCACHED_";

/// Scan the process environment for `RUNCACHED_<OPT>` /
/// `RUNCACHED_<OPT>__<CMD>` variables and splice the flags they encode
/// in front of `argv`, so that explicit command-line flags (appended
/// after, and therefore parsed later by clap's last-one-wins semantics
/// for non-repeatable flags) still take precedence.
///
/// `<CMD>` only applies when `command_name` (the basename of the first
/// positional command token) equals it, compared literally on the
/// unmodified name (`spec.md §6`: "single-letter options are
/// case-sensitive, long options are upper-case" describes the option
/// name's own casing convention, not a case-folding rule for `<CMD>`).
pub fn splice_overrides<I, S>(argv: I, command_name: Option<&str>) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut vars: Vec<(String, String)> = std::env::vars()
        .filter(|(name, _)| name.starts_with(OVERRIDE_PREFIX))
        .collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));

    let mut injected = Vec::new();
    for (name, value) in vars {
        let rest = &name[OVERRIDE_PREFIX.len()..];
        let (opt, scoped_cmd) = match rest.split_once("__") {
            Some((opt, cmd)) => (opt, Some(cmd)),
            None => (rest, None),
        };
        if let Some(scoped_cmd) = scoped_cmd
            && Some(scoped_cmd) != command_name
        {
            continue;
        }
        injected.extend(override_to_flag(opt, &value));
    }

    let mut out = injected;
    out.extend(argv.into_iter().map(Into::into));
    out
}

/// Turn a single override's option name + value into the argv tokens
/// clap should see: `-X value` (or a bare `-X` when the value is empty,
/// for boolean flags) for a single-character option name; `--name
/// value` lower-cased with `_` turned into `-` for a multi-character
/// name, matching the long-flag spelling clap derives from
/// `#[arg(long)]`.
fn override_to_flag(opt: &str, value: &str) -> Vec<String> {
    let flag = if opt.chars().count() == 1 {
        format!("-{opt}")
    } else {
        format!("--{}", opt.to_lowercase().replace('_', "-"))
    };
    if value.is_empty() {
        vec![flag]
    } else {
        vec![flag, value.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_ttl("30").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parses_suffixed_durations() {
        assert_eq!(parse_ttl("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_ttl("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_ttl("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_ttl("10s").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_malformed_duration() {
        assert!(parse_ttl("abc").is_err());
        assert!(parse_ttl("1x").is_err());
    }

    #[test]
    fn parses_a_bare_glob() {
        let arg = parse_env_arg("LC_*", true).unwrap();
        assert_eq!(arg.name, "LC_*");
        assert!(arg.assigned_value.is_none());
    }

    #[test]
    fn parses_an_assignment() {
        let arg = parse_env_arg("FOO=bar", true).unwrap();
        assert_eq!(arg.name, "FOO");
        assert_eq!(arg.assigned_value.as_deref(), Some("bar"));
    }

    #[test]
    fn rejects_assignment_with_a_glob_name() {
        assert!(parse_env_arg("FOO*=bar", true).is_err());
    }

    #[test]
    fn rejects_assignment_when_not_allowed() {
        assert!(parse_env_arg("FOO=bar", false).is_err());
    }

    #[test]
    fn stdin_resolution_prefers_exclude_over_include() {
        let cli = Cli::parse_from(["runcached", "-i", "-I", "--", "echo"]);
        assert!(!cli.resolve_include_stdin(false));
    }

    #[test]
    fn stdin_resolution_defaults_to_not_a_tty() {
        let cli = Cli::parse_from(["runcached", "--", "echo"]);
        assert!(cli.resolve_include_stdin(false));
        assert!(!cli.resolve_include_stdin(true));
    }

    #[test]
    fn override_single_letter_option_becomes_short_flag() {
        assert_eq!(override_to_flag("F", ""), vec!["-F".to_string()]);
        assert_eq!(
            override_to_flag("t", "30s"),
            vec!["-t".to_string(), "30s".to_string()]
        );
    }

    #[test]
    fn override_long_option_is_lowercased_with_dashes() {
        assert_eq!(
            override_to_flag("KEEP_FAILURES", ""),
            vec!["--keep-failures".to_string()]
        );
    }
}
