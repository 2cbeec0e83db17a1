use runcached::{
    cache::{CacheStore, Stream},
    controller::{self, RunConfig},
    env_resolver::{EnvArg, EnvRuleSet},
    fingerprint::{self, Cacheable},
};
use std::{collections::BTreeMap, time::Duration};

/// The child needs `$PATH` on its own environment to resolve a bare
/// binary name (`Spawner::spawn` never inherits the parent's env), so
/// every test config passes it through.
fn rules() -> EnvRuleSet {
    EnvRuleSet {
        include: vec![],
        passthru: vec![EnvArg::pattern("PATH")],
        exclude: vec![],
    }
}

fn process_env() -> BTreeMap<String, String> {
    std::iter::once((
        "PATH".to_string(),
        std::env::var("PATH").unwrap_or_default(),
    ))
    .collect()
}

fn config(command: &[&str], ttl: Duration, keep_failures: bool) -> RunConfig {
    RunConfig {
        command: command.iter().map(|s| s.to_string()).collect(),
        rules: rules(),
        include_stdin: false,
        shell: false,
        shlex_quote: false,
        strip_colors: false,
        ttl,
        keep_failures,
    }
}

#[test]
fn second_identical_run_is_a_cache_hit() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path().to_path_buf());
    let env = process_env();
    let cfg = config(&["echo", "foo"], Duration::from_secs(86400), false);

    let first = controller::run(&cfg, &store, &env).unwrap();
    assert_eq!(first, 0);

    let fp = fingerprint::derive(&Cacheable {
        command: &cfg.command,
        envs_for_cache: &BTreeMap::new(),
        input: None,
        shell: false,
        shlex_quote: false,
    });
    let recording = store.get(fp).expect("first run should populate the cache");
    assert_eq!(recording.result.return_code, 0);
    let stdout: Vec<u8> = recording
        .chunks()
        .filter(|(s, _)| *s == Stream::Stdout)
        .flat_map(|(_, b)| b.to_vec())
        .collect();
    assert_eq!(stdout, b"foo\n");

    let second = controller::run(&cfg, &store, &env).unwrap();
    assert_eq!(second, 0);

    // A cache hit never writes; the stored timestamp proves no rerun spawned.
    let recording_after_hit = store.get(fp).unwrap();
    assert_eq!(
        recording_after_hit.result.started_at,
        recording.result.started_at
    );
}
