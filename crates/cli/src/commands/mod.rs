// CLI subcommand dispatch.

use clap::Subcommand;

pub mod doctor;
pub mod sync;

#[derive(Subcommand)]
pub enum Command {
    /// Synchronize the fork clone with its upstream
    Sync(sync::SyncArgs),
    /// Check the tools and repository this workflow depends on
    Doctor(doctor::DoctorArgs),
}

impl Default for Command {
    fn default() -> Self {
        Command::Sync(sync::SyncArgs::default())
    }
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Sync(args) => sync::run(args),
        Command::Doctor(args) => doctor::run(args),
    }
}
