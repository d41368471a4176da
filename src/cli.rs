use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "atc_radio", about = "Headless pilot/ATC radio session")]
pub struct Args {
    /// Settings file (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured callsign
    #[arg(long)]
    pub callsign: Option<String>,

    /// Seed for controller response delays
    #[arg(long)]
    pub seed: Option<u64>,

    /// Scripted session to run
    #[arg(short, long, value_enum, default_value_t = Scenario::Taxi)]
    pub scenario: Scenario,

    /// Simulated seconds to run
    #[arg(short, long, default_value_t = 180.0)]
    pub duration: f64,

    /// Simulated seconds per tick
    #[arg(long, default_value_t = 0.1)]
    pub dt: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Taxi, hold short, contact tower, then a takeoff clearance with an
    /// emergency call cutting in.
    Takeoff,
    /// Progressive taxi from parking to the runway.
    Taxi,
    /// Instructions, a wrong readback and a say-again.
    Readback,
}
