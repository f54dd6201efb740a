use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use robolink::drive::{DriveMix, parse_stick_line};
use robolink::link::{LinkManager, numbered_messages};
use robolink::protocol::{Component, Index, Operation, PacketEncoder, Receiver, Transmitter};
use robolink::sink::{LogSink, Severity, TracingSink};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let log_file = match log_file {
        Some(path) => path.to_path_buf(),
        None => {
            // Create log directory
            let log_dir = dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("robolink")
                .join("logs");
            fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
            log_dir.join("robolink.log")
        }
    };

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    if verbose && std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Sink that logs through tracing and echoes to the terminal
fn console_sink(verbose: bool) -> Arc<dyn LogSink> {
    Arc::new(move |severity: Severity, message: &str| {
        TracingSink.log(severity, message);
        match severity {
            Severity::Info => println!("{} {}", "INFO ".green(), message),
            Severity::Error => eprintln!("{} {}", "ERROR".red().bold(), message),
            Severity::Debug if verbose => println!("{} {}", "DEBUG".dimmed(), message),
            Severity::Debug => {}
        }
    })
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => {
            println!("{}", "No command given; try --help".yellow());
            Ok(())
        }
        Some(Commands::Encode {
            transmitter,
            receiver,
            operation,
            component,
            index,
            payload,
            count,
        }) => handle_encode_command(
            *transmitter,
            *receiver,
            *operation,
            *component,
            *index,
            payload,
            *count,
        ),
        Some(Commands::Drive { url, bound }) => {
            handle_drive_command(url.as_deref(), *bound, config, cli.is_verbose()).await
        }
        Some(Commands::Chatter {
            url,
            interval_ms,
            prefix,
            duration_secs,
        }) => {
            let url = url.as_deref().unwrap_or(&config.link.url);
            let interval = Duration::from_millis(interval_ms.unwrap_or(config.chatter.interval_ms));
            let prefix = prefix.as_deref().unwrap_or(&config.chatter.prefix);
            handle_chatter_command(
                url,
                interval,
                prefix,
                duration_secs.map(Duration::from_secs),
                config,
                cli.is_verbose(),
            )
            .await
        }
    }
}

fn handle_encode_command(
    transmitter: Transmitter,
    receiver: Receiver,
    operation: Operation,
    component: Component,
    index: Index,
    payload: &[i32],
    count: u32,
) -> Result<()> {
    info!("Encoding {} packet(s) for {} {}", count, component, index);
    let encoder = PacketEncoder::new();
    for _ in 0..count.max(1) {
        println!("{}", encoder.encode(transmitter, receiver, operation, component, index, payload));
    }
    Ok(())
}

async fn handle_drive_command(url: Option<&str>, bound: Option<i32>, config: &Config, verbose: bool) -> Result<()> {
    let url = url.unwrap_or(&config.link.url);
    let bound = bound.unwrap_or(config.drive.bound);
    let drive = &config.drive;
    info!("Driving {} via {} (bound {})", drive.component, url, bound);

    let link = LinkManager::websocket(config.link.to_link_config(), console_sink(verbose));
    link.connect(url).await.context(format!("Failed to connect to {}", url))?;
    println!("{} {}", "Connected:".green(), url);
    println!("Enter stick positions as \"x y\" (-{} to {}), Ctrl-D to stop", bound, bound);

    let encoder = PacketEncoder::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let Some((x, y)) = parse_stick_line(&line) else {
            println!("{} {:?}", "Ignoring malformed line:".yellow(), line);
            continue;
        };
        let mix = DriveMix::from_stick(x, y, bound);
        let packet = encoder.motor_speed_command(drive.transmitter, drive.receiver, drive.component, mix.motor_speeds());
        send_or_warn(&link, packet, &format!("Packet for ({}, {})", x, y)).await;
    }

    // Stop the robot before leaving
    let stop = encoder.motor_speed_command(drive.transmitter, drive.receiver, drive.component, [0; 6]);
    send_or_warn(&link, stop, "Stop packet").await;
    link.disconnect().await.context("Failed to disconnect")?;
    link.shutdown();
    println!("{}", "Disconnected".cyan());
    Ok(())
}

/// Send one drive packet; failures were already reported by the link, so only warn
async fn send_or_warn(link: &LinkManager, packet: String, what: &str) -> bool {
    match link.send(packet).await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{} dropped, link is {}: {}", what, link.state(), e);
            false
        }
    }
}

async fn handle_chatter_command(
    url: &str,
    interval: Duration,
    prefix: &str,
    duration: Option<Duration>,
    config: &Config,
    verbose: bool,
) -> Result<()> {
    info!("Chatter to {} every {}ms", url, interval.as_millis());

    let link = LinkManager::websocket(config.link.to_link_config(), console_sink(verbose));
    link.connect(url).await.context(format!("Failed to connect to {}", url))?;
    println!("{} {}", "Connected:".green(), url);

    let sender = link.send_at(interval, numbered_messages(prefix));
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => tokio::signal::ctrl_c().await.context("Failed to wait for Ctrl-C")?,
    }
    sender.cancel();
    println!("{} {} message(s)", "Sent".green(), sender.sent());

    link.disconnect().await.context("Failed to disconnect")?;
    link.shutdown();
    println!("{}", "Disconnected".cyan());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging before anything else reports
    setup_logging(cli.log_file.as_deref(), cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use robolink::link::{LinkConfig, MockConnector};
    use robolink::sink::MemorySink;

    fn mock_link(mock: &MockConnector) -> LinkManager {
        LinkManager::new(LinkConfig::default(), Arc::new(mock.clone()), Arc::new(MemorySink::new()))
    }

    #[tokio::test]
    async fn test_send_or_warn_reports_dropped_stop_packet() {
        let mock = MockConnector::new();
        let link = mock_link(&mock);
        let stop = PacketEncoder::new().motor_speed_command(Transmitter::Master, Receiver::All, Component::Drive, [0; 6]);

        assert!(!send_or_warn(&link, stop.clone(), "Stop packet").await);
        assert!(mock.sent().is_empty());

        link.connect("ws://robot:2005").await.unwrap();
        assert!(send_or_warn(&link, stop.clone(), "Stop packet").await);
        assert_eq!(mock.sent(), vec![stop]);
    }
}
