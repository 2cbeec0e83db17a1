use clap::CommandFactory;
use clap_complete::{generate, shells};
use std::io::Error;

fn main() -> Result<(), Error> {
    let mut cli = runcached::cli::Cli::command();

    let mut out = std::fs::File::create("runcached.bash")?;
    generate(shells::Bash, &mut cli, "runcached", &mut out);

    let mut out = std::fs::File::create("runcached.fish")?;
    generate(shells::Fish, &mut cli, "runcached", &mut out);

    let mut out = std::fs::File::create("_runcached")?;
    generate(shells::Zsh, &mut cli, "runcached", &mut out);

    Ok(())
}
