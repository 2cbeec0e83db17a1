//! Turns CLI-level env rules plus the process environment into the two
//! disjoint maps `RunConfig` needs: one that feeds the fingerprint, one
//! that is forwarded to the child but ignored for the key.

use std::collections::BTreeMap;

/// A single `-e/-p/-E` token: a glob pattern, a literal name, or a literal
/// name with an explicit assigned value. Assignment with a glob pattern
/// is rejected at parse time (`cli::parse_env_arg`); by the time an
/// `EnvArg` reaches the resolver its `assigned_value` can only be present
/// alongside a literal `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvArg {
    pub name: String,
    pub assigned_value: Option<String>,
}
impl EnvArg {
    /// A bare glob or literal name, with no assignment.
    pub fn pattern(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assigned_value: None,
        }
    }

    /// A literal name bound to an explicit value.
    pub fn assignment(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assigned_value: Some(value.into()),
        }
    }

    /// Whether this token's pattern matches `candidate`, under POSIX
    /// fnmatch semantics restricted to `*`, `?`, and `[...]` (the only
    /// metacharacters spec.md names). A name with no metacharacters
    /// matches only itself.
    pub fn matches(&self, candidate: &str) -> bool {
        glob_match(&self.name, candidate)
    }
}

/// The three ordered rule lists that drive `select`.
#[derive(Debug, Clone, Default)]
pub struct EnvRuleSet {
    pub include: Vec<EnvArg>,
    pub passthru: Vec<EnvArg>,
    pub exclude: Vec<EnvArg>,
}

/// Run the resolver: `spec.md §4.1`.
///
/// `shell` and `term` carry the special-case injections: when `shell` is
/// `Some(path)`, `SHELL` is forced into the cached map with that value;
/// when `term` is `Some(value)` (PTY mode requested and `TERM` present in
/// the process environment), `TERM` is forced into the cached map too.
pub fn resolve(
    env: &BTreeMap<String, String>,
    rules: &EnvRuleSet,
    shell: Option<&str>,
    term: Option<&str>,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut cached = select(env, &rules.include, &rules.exclude);
    let mut passthrough = select(env, &rules.passthru, &rules.exclude);

    if let Some(shell) = shell {
        cached.insert("SHELL".to_string(), shell.to_string());
    }
    if let Some(term) = term {
        cached.insert("TERM".to_string(), term.to_string());
    }

    // Disjointness postcondition: cached takes precedence.
    passthrough.retain(|name, _| !cached.contains_key(name));

    (cached, passthrough)
}

/// `SELECT(E, match, reject, assign=match)`: spec.md §4.1.
fn select(
    env: &BTreeMap<String, String>,
    matchers: &[EnvArg],
    reject: &[EnvArg],
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();

    for (name, value) in env {
        if matchers.iter().any(|m| m.matches(name)) && !reject.iter().any(|r| r.matches(name)) {
            out.insert(name.clone(), value.clone());
        }
    }

    // Explicit assignments introduce names that may be entirely absent
    // from the process environment, and override the environment's value
    // when present.
    for m in matchers {
        if let Some(value) = &m.assigned_value
            && !reject.iter().any(|r| r.matches(&m.name))
        {
            out.insert(m.name.clone(), value.clone());
        }
    }

    out
}

/// A minimal POSIX fnmatch: `*` (any run of characters), `?` (any single
/// character), `[...]` (a character class, `[!...]`/`[^...]` negated).
/// No brace expansion, no `**`, no escaping: spec.md names only these
/// three metacharacters.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let c: Vec<char> = candidate.chars().collect();
    match_from(&p, &c)
}

fn match_from(p: &[char], c: &[char]) -> bool {
    match p.first() {
        None => c.is_empty(),
        Some('*') => match_from(&p[1..], c) || (!c.is_empty() && match_from(p, &c[1..])),
        Some('?') => !c.is_empty() && match_from(&p[1..], &c[1..]),
        Some('[') => {
            let Some(close) = p.iter().position(|&ch| ch == ']').filter(|&i| i > 0) else {
                return !c.is_empty() && c[0] == '[' && match_from(&p[1..], &c[1..]);
            };
            if c.is_empty() {
                return false;
            }
            let mut class = &p[1..close];
            let negate = matches!(class.first(), Some('!') | Some('^'));
            if negate {
                class = &class[1..];
            }
            let in_class = char_in_class(class, c[0]);
            if in_class == negate {
                return false;
            }
            match_from(&p[close + 1..], &c[1..])
        }
        Some(&lit) => !c.is_empty() && c[0] == lit && match_from(&p[1..], &c[1..]),
    }
}

fn char_in_class(class: &[char], ch: char) -> bool {
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == '-' {
            if class[i] <= ch && ch <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == ch {
                return true;
            }
            i += 1;
        }
    }
    false
}
