//! Command-line front end over the workspace

mod commands;

/// Parse arguments and run one command against the local project store
pub fn run() -> anyhow::Result<()> {
    commands::run()
}
