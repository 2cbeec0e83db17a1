use anyhow::Context;
use clap::Parser;
use runcached::cli::Cli;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let raw_argv: Vec<String> = std::env::args().collect();
    // The `<CMD>`-scoped override form only applies when the first
    // command token can be identified; the documented invocation shape
    // is `runcached [flags] -- command [args...]`, so look for the `--`
    // separator rather than guessing at flag arity.
    let command_name = raw_argv
        .iter()
        .position(|a| a == "--")
        .and_then(|i| raw_argv.get(i + 1))
        .map(String::as_str);
    // `splice_overrides` only operates on the flags/command portion of
    // argv; the program name at index 0 stays first so clap still sees a
    // well-formed `argv[0], ...` vector.
    let program = raw_argv.first().cloned().unwrap_or_default();
    let rest = raw_argv.iter().skip(1).cloned();
    let spliced = runcached::cli::splice_overrides(rest, command_name);
    let argv = std::iter::once(program).chain(spliced);

    let cli = Cli::parse_from(argv);

    let level = if cli.quiet {
        log::LevelFilter::Warn
    } else if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[runcached:{}] {}", record.level(), record.args())
        })
        .init();

    match runcached::run(&cli) {
        Ok(code) => Ok(ExitCode::from(code.clamp(0, 255) as u8)),
        Err(err) => {
            log::error!("{err}");
            Err(anyhow::Error::from(err)).context("runcached failed")
        }
    }
}
