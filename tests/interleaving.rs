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

fn config(command: &[&str]) -> RunConfig {
    RunConfig {
        command: command.iter().map(|s| s.to_string()).collect(),
        rules: rules(),
        include_stdin: false,
        shell: false,
        shlex_quote: false,
        strip_colors: false,
        ttl: Duration::from_secs(86400),
        keep_failures: false,
    }
}

#[test]
fn per_stream_totals_and_merged_order_survive_a_replay() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path().to_path_buf());
    let env = process_env();
    let cfg = config(&[
        "sh",
        "-c",
        "echo foo; echo bar >&2; echo baz; echo boz >&2",
    ]);

    let first = controller::run(&cfg, &store, &env).unwrap();
    assert_eq!(first, 0);

    let fp = fingerprint::derive(&Cacheable {
        command: &cfg.command,
        envs_for_cache: &BTreeMap::new(),
        input: None,
        shell: false,
        shlex_quote: false,
    });
    let recording = store.get(fp).unwrap();

    let stdout: Vec<u8> = recording
        .chunks()
        .filter(|(s, _)| *s == Stream::Stdout)
        .flat_map(|(_, b)| b.to_vec())
        .collect();
    let stderr: Vec<u8> = recording
        .chunks()
        .filter(|(s, _)| *s == Stream::Stderr)
        .flat_map(|(_, b)| b.to_vec())
        .collect();
    assert_eq!(stdout, b"foo\nbaz\n");
    assert_eq!(stderr, b"bar\nboz\n");

    let merged_first: Vec<(Stream, Vec<u8>)> = recording
        .chunks()
        .map(|(s, b)| (s, b.to_vec()))
        .collect();

    // The second run is a cache hit, so replay reads the exact same stored
    // sequence rather than re-deriving it from a fresh spawn.
    let second = controller::run(&cfg, &store, &env).unwrap();
    assert_eq!(second, 0);
    let recording_after_hit = store.get(fp).unwrap();
    let merged_second: Vec<(Stream, Vec<u8>)> = recording_after_hit
        .chunks()
        .map(|(s, b)| (s, b.to_vec()))
        .collect();
    assert_eq!(merged_first, merged_second);
}
