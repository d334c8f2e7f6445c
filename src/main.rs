// in-crate modules
mod config;

// in-crate imports
use config::*;

// my libraries
use ltr329::regs::POLL_INTERVAL_MS;
use ltr329::{I2cBus, Ltr329, RegisterBus, SystemClock};
use xdg_dirs::{dirs, xdg_location_of, xdg_user_dir};

// STD
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::{fs, thread, time};

// 3rd party libraries
use anyhow::Context;
use clap::{Parser, Subcommand, command};
use ftdi_embedded_hal as hal;
use log::{debug, info};

const CONFIG_PATH: &str = "ltr329-lux/config.ron";

const DEFAULT_CONFIG: &str = r#"
(
    sensor: (
        gain: 1,
        integration_ms: 100,
        rate_ms: 1000,
    ),
    mode: Single,
    interval_ms: 1000,
    adapter: (
        vendor_id: 0x0403,
        product_id: 0x6014,
    ),
)
"#;

#[derive(Debug, Subcommand, PartialEq)]
enum Command {
    #[command(
        about = "(default) Measure repeatedly and print the illuminance using the settings from the config file."
    )]
    Run,

    #[command(about = "Print the part number, revision and manufacturer ID of the sensor.")]
    Info,

    #[command(
        about = "Check configuration file syntax and print out the settings that will be applied."
    )]
    Check,

    #[command(about = "Generate a default config file")]
    GenConfig,
}

#[derive(Debug, Parser, PartialEq)]
#[command(
    about = "Read illuminance from an LTR-329ALS ambient light sensor on an FTDI USB-to-I2C adapter",
    version
)]
struct Args {
    #[arg(
        global = true,
        short,
        long = "config",
        help = format!("Path to configuration file. Defaults to `{CONFIG_PATH}` under the user's config directory."),
    )]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Args {
    /// Get the config path, and verify the file exists. This is the either the path passed as an arg, or from the XDG directory if not specified.
    ///
    /// This returns error if the path does not exist.
    fn get_config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config_path {
            Some(path) => path
                .canonicalize()
                .with_context(|| format!("Could not open config file `{0}`", path.display())),
            None => xdg_location_of(&dirs::CONFIG, CONFIG_PATH)
                .with_context(|| "Could not open config file"),
        }
    }
}

/// Load the configuration based on arguments.
/// Uses the file supplied to the CLI, or in the default location if not specified, or the default config if there is no file.
fn get_config(args: &Args) -> anyhow::Result<Config> {
    let config = match args.get_config_path() {
        Ok(path) => {
            println!("Reading config from {path}", path = path.display());
            Config::read_from_file(path)?
        }
        Err(err) => {
            eprintln!(
                "Config file not found in any standard locations, using default configuration."
            );
            eprintln!("  Config search error: {err}");
            Config::from_str(DEFAULT_CONFIG)?
        }
    };
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    debug!("args = {args:?}");

    // process commands
    match args.command {
        // Primary behaviour: repeatedly measure and print
        None | Some(Command::Run) => main_loop(&args),

        // Identify the sensor
        Some(Command::Info) => sensor_info(&args),

        // Test config file: make sure it exists, can be read, and can be parsed
        Some(Command::Check) => check_config(&args),

        // Generate config file: if the file does not already exist, write
        Some(Command::GenConfig) => gen_config_file(&args),
    }
}

/// Verify the config file: Make sure it can be found at the expected location (passed through CLI or using XDG config location), and parses properly.
fn check_config(args: &Args) -> anyhow::Result<()> {
    // Try to _find_ the config file
    let path = args
        .get_config_path()
        .with_context(|| "Failed to find config file")?;

    // Try to _parse_ the config file
    println!("Attempting to load config from `{0}`", path.display());
    let config = Config::read_from_file(path).with_context(|| "Failed to parse configuration")?;
    config.validate().with_context(|| "Invalid sensor settings")?;

    println!("Successfully read config: {config:#?}");

    Ok(())
}

/// Generate a default configuration file, at the expected location based on args or environment variables.
fn gen_config_file(args: &Args) -> anyhow::Result<()> {
    // CLI arg path, or default from environment
    let path = args
        .config_path
        .clone()
        .map_or_else(|| xdg_user_dir(&dirs::CONFIG, CONFIG_PATH), Ok)
        .with_context(|| "Could not determine location for config file")?;

    // Create parent directory path if applicable
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create parent directory of the new config file {0}",
                path.display()
            )
        })?;
    }

    // Refuses to overwrite an existing file
    let mut file = File::create_new(&path)
        .with_context(|| format!("Failed to create new config file {0}", path.display()))?;

    write!(file, "{}", DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write the new config file {0}", path.display()))?;

    println!("Wrote default config to {0}", path.display());
    Ok(())
}

/// Connect to the sensor through the FTDI adapter and bring it up.
fn open_sensor(
    adapter: &AdapterConfig,
) -> anyhow::Result<Ltr329<I2cBus<impl embedded_hal::i2c::I2c>, SystemClock>> {
    let device = ftdi::find_by_vid_pid(adapter.vendor_id, adapter.product_id)
        .interface(ftdi::Interface::A)
        .open()
        .with_context(|| {
            format!(
                "Could not open FTDI adapter {0:04x}:{1:04x}",
                adapter.vendor_id, adapter.product_id
            )
        })?;
    let i2c = hal::FtHal::init_default(device)?.i2c()?;

    let mut sensor = Ltr329::from_i2c(i2c, SystemClock::new());
    sensor.on_transition(|from, to| debug!("sensor {0} -> {1}", from.name(), to.name()));
    sensor.begin().with_context(|| "Failed to start the LTR-329ALS")?;

    Ok(sensor)
}

/// Poll until the running measurement has a result, then convert it.
fn wait_for_lux<B: RegisterBus, C: ltr329::Clock>(
    sensor: &mut Ltr329<B, C>,
) -> anyhow::Result<f32> {
    while !sensor.query_ready()? {
        thread::sleep(time::Duration::from_millis(POLL_INTERVAL_MS.into()));
    }
    Ok(sensor.get_lux()?)
}

/// Default behaviour: Read config file, then measure and print forever.
fn main_loop(args: &Args) -> anyhow::Result<()> {
    // Read in configuration, or load default configuration
    let config = get_config(args)?;
    println!("Loaded configuration: {config:?}");

    let mut sensor = open_sensor(&config.adapter)?;
    sensor.configure(config.sensor)?;

    if config.mode == Mode::Continuous {
        sensor.start_continuous_measurement()?;
    }

    loop {
        if config.mode == Mode::Single {
            sensor.start_single_measurement()?;
        }

        let lux = wait_for_lux(&mut sensor).with_context(|| "Measurement failed")?;
        let raw = sensor.raw_data();
        info!(
            "ch0 = {0}, ch1 = {1}, gain {2}",
            raw.chan0(),
            raw.chan1(),
            raw.status().gain()
        );
        println!("{lux:.2} lux");

        thread::sleep(time::Duration::from_millis(config.interval_ms));
    }
}

/// Bring up the sensor and print its identification registers.
fn sensor_info(args: &Args) -> anyhow::Result<()> {
    let config = get_config(args)?;
    let mut sensor = open_sensor(&config.adapter)?;

    // identified during begin()
    let info = sensor
        .product_info()
        .ok_or_else(|| anyhow::anyhow!("Sensor was not identified"))?;
    println!("Part number:     {0:#x}", info.part_number);
    println!("Revision ID:     {0:#x}", info.revision);
    println!("Manufacturer ID: {0:#04x}", info.manufacturer);

    sensor.end()?;
    Ok(())
}
