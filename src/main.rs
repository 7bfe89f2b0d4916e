use anyhow::Result;
use clap::{Arg, ArgAction, Command};

use devpulse::commands;

fn main() -> Result<()> {
    devpulse::init_logging();

    let matches = Command::new("devpulse")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Continuous device telemetry and power monitor")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .short_alias('V')
                .long("version")
                .help("Print version information")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("run")
                .about("Run the sampling loop in the foreground until Ctrl+C")
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("SECS")
                        .help("Seconds between sampling cycles (overrides the config)")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help("Run even if monitoring was disabled")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("sample")
                .about("Run a single sampling cycle and print the result")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the full cycle report as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("status").about("Show the last persisted sample and run flags"))
        .subcommand(Command::new("enable").about("Enable background monitoring"))
        .subcommand(Command::new("disable").about("Disable background monitoring"))
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration")
                .arg(
                    Arg::new("save")
                        .long("save")
                        .help("Write the effective configuration to the config file")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("version").about("Shows version information"))
        .get_matches();

    if matches.get_flag("version") {
        return commands::version();
    }

    match matches.subcommand() {
        Some(("run", sub_matches)) => commands::monitor::handle_run(sub_matches),
        Some(("sample", sub_matches)) => commands::monitor::handle_sample(sub_matches),
        Some(("status", _)) => commands::status::execute(),
        Some(("enable", _)) => commands::flags::set_monitoring(true),
        Some(("disable", _)) => commands::flags::set_monitoring(false),
        Some(("config", sub_matches)) => commands::config::execute(sub_matches),
        Some(("version", _)) => commands::version(),
        _ => {
            println!("Welcome to devpulse!");
            println!("Use 'devpulse --help' for more information.");
            Ok(())
        }
    }
}
