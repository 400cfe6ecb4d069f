mod generate;
mod simulate;

use {
    crate::logger::Logger,
    ::log::Level,
    clap::{Args, Parser, Subcommand, ValueEnum},
    clap_complete::Shell,
    std::{path::PathBuf, time::Duration},
};

/// Frame pacing for wayland surfaces.
#[derive(Parser, Debug)]
#[command(version)]
pub struct JayFifo {
    #[clap(flatten)]
    global: GlobalArgs,
    #[clap(subcommand)]
    command: Cmd,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// The log level.
    #[clap(value_enum, long, default_value_t, global = true)]
    pub log_level: CliLogLevel,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Run a client against a simulated output.
    Simulate(SimulateArgs),
    /// Generate shell completion scripts for jay-fifo.
    GenerateCompletion(GenerateArgs),
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// The path of the config file.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// The refresh rate of the output in Hz.
    ///
    /// Overrides the value from the config file.
    #[clap(long)]
    pub refresh_rate: Option<f64>,
    /// The rate in Hz at which the client commits frames.
    ///
    /// Overrides the value from the config file.
    #[clap(long)]
    pub client_rate: Option<f64>,
    /// How long the simulation runs.
    ///
    /// For example `1s`, `500ms` or `1min 5s`.
    #[clap(long, value_parser = humantime::parse_duration, default_value = "1s")]
    pub duration: Duration,
    /// Stop refreshing the output after this duration.
    ///
    /// The fallback timer paces the client from then on.
    #[clap(long, value_parser = humantime::parse_duration)]
    pub occluded_after: Option<Duration>,
    /// Advance a virtual clock instead of waiting in real time.
    #[clap(long)]
    pub virtual_time: bool,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// The shell to generate completions for
    #[clap(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Copy, Clone, Hash, Default)]
pub enum CliLogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Trace => Level::Trace,
            CliLogLevel::Debug => Level::Debug,
            CliLogLevel::Info => Level::Info,
            CliLogLevel::Warn => Level::Warn,
            CliLogLevel::Error => Level::Error,
        }
    }
}

pub fn main() {
    let cli = JayFifo::parse();
    match cli.command {
        Cmd::Simulate(a) => {
            Logger::install_stderr(cli.global.log_level.into());
            simulate::main(a)
        }
        Cmd::GenerateCompletion(g) => generate::main(g),
    }
}
