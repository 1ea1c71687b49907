use std::{path::PathBuf, process::ExitCode};

use clap::{ArgGroup, Parser, Subcommand};
use log::LevelFilter;
use usbmux::{LinkState, Mux, Selector};

use connect::*;
use error::CliError;
use list::*;
use output::*;
use update::*;

mod connect;
mod error;
mod list;
mod output;
mod update;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// serial number of the USB-Mux
    #[clap(short, long, global = true)]
    serial: Option<String>,
    /// USB path of the USB-Mux (ex: "1-4.2")
    #[clap(short, long, global = true)]
    path: Option<String>,
    /// print results as JSON
    #[clap(long, global = true, conflicts_with = "raw")]
    json: bool,
    /// print the status as plain key: value pairs
    #[clap(long, global = true)]
    raw: bool,
    /// enable debug output
    #[clap(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Default)]
enum Commands {
    /// list attached USB-Mux
    #[default]
    List,
    /// show status
    Status,
    /// connect ports, everything else is disconnected
    Connect {
        /// connect the DUT to the host
        #[clap(long)]
        host_dut: bool,
        /// connect the device to the host
        #[clap(long)]
        host_device: bool,
        /// connect the device to the DUT, pulls the ID pin low
        #[clap(long)]
        dut_device: bool,
        /// do not touch the ID pin
        #[clap(long)]
        no_id: bool,
    },
    /// disconnect all ports
    Disconnect {
        /// do not touch the ID pin
        #[clap(long)]
        no_id: bool,
    },
    /// set the ID pin of the DUT port
    #[clap(group(ArgGroup::new("level").required(true)))]
    Id {
        /// let the pin float (pulled up)
        #[clap(long, group = "level")]
        float: bool,
        /// pull the pin low
        #[clap(long, group = "level")]
        pull_low: bool,
    },
    /// reboot into the DFU bootloader
    Dfu,
    /// update the firmware (needs --serial or --path)
    Update {
        /// firmware image (ex: umx-T03_0.1.2.bin)
        #[clap(short, long)]
        firmware: PathBuf,
    },
    /// write a configuration block, the device must be in DFU mode
    FlashConfig {
        /// configuration image
        #[clap(short, long)]
        file: PathBuf,
    },
    /// leave the DFU bootloader
    LeaveDfu,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::List => "list",
            Commands::Status => "status",
            Commands::Connect { .. } => "connect",
            Commands::Disconnect { .. } => "disconnect",
            Commands::Id { .. } => "id",
            Commands::Dfu => "dfu",
            Commands::Update { .. } => "update",
            Commands::FlashConfig { .. } => "flash-config",
            Commands::LeaveDfu => "leave-dfu",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let mode = if cli.json {
        Mode::Json
    } else if cli.raw {
        Mode::Raw
    } else {
        Mode::Text
    };
    let selector = Selector {
        serial: cli.serial,
        path: cli.path,
    };
    let command = cli.command.unwrap_or_default();

    let result = run(&command, &selector, mode);
    if mode == Mode::Json {
        let result = result.map_err(|err| err.to_string());
        print_json(command.name(), &result);
        return if result.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }
    match result {
        Ok(output) => {
            print_text(&output, mode);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    command: &Commands,
    selector: &Selector,
    mode: Mode,
) -> Result<Output, CliError> {
    let path = selector.path.as_deref();
    match command {
        // JSON only lists serial and path
        Commands::List => Ok(Output::List(list_muxes(mode != Mode::Json)?)),
        Commands::Status => {
            Ok(Output::Status(Mux::open(selector)?.get_status()?))
        }
        Commands::Connect {
            host_dut,
            host_device,
            dut_device,
            no_id,
        } => {
            let (link, id) =
                links_from_flags(*host_dut, *host_device, *dut_device, *no_id)?;
            connect(selector, link, id)
        }
        Commands::Disconnect { no_id } => {
            connect(selector, LinkState::None, (!no_id).then_some(false))
        }
        Commands::Id { pull_low, .. } => {
            let status = Mux::open(selector)?.pull_otg_id_low(*pull_low)?;
            Ok(Output::Status(status))
        }
        Commands::Dfu => {
            Mux::open(selector)?.enter_dfu()?;
            Ok(Output::Done)
        }
        Commands::Update { firmware } => {
            update(selector, firmware)?;
            Ok(Output::Done)
        }
        Commands::FlashConfig { file } => {
            write_config(path, file)?;
            Ok(Output::Done)
        }
        Commands::LeaveDfu => {
            leave_dfu(path)?;
            Ok(Output::Done)
        }
    }
}

fn connect(
    selector: &Selector,
    link: LinkState,
    id_pull_low: Option<bool>,
) -> Result<Output, CliError> {
    let mux = Mux::open(selector)?;
    mux.connect(link, id_pull_low)?;
    Ok(Output::Status(mux.get_status()?))
}
