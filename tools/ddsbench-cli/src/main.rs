// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ddsbench - DDS throughput benchmark tool
//!
//! Publishes deterministic payloads at a target rate and measures what a
//! subscriber receives. Run `pub` and `sub` as separate processes over UDP
//! multicast, or `loopback` for an in-process run.

use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::*;
use ddsbench::{
    BenchConfig, LoopbackTransport, PublisherConfig, QosPreset, Receiver,
    ReceiverConfig, ReceiverReport, Transport, UdpTransport,
};
use env_logger::Env;
use std::path::PathBuf;
use std::thread;

/// DDS throughput benchmark tool
#[derive(Parser, Debug)]
#[command(name = "ddsbench")]
#[command(version)]
#[command(about = "Measure DDS publish/subscribe throughput")]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// DDS domain ID
    #[arg(short, long, global = true)]
    domain: Option<u32>,

    /// Topic name
    #[arg(short, long, global = true)]
    topic: Option<String>,

    /// QoS preset: reliable, high-throughput, best-effort
    #[arg(short, long, global = true)]
    qos: Option<String>,

    /// YAML run file; command-line flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Send messages at a target rate
    Pub(PubArgs),
    /// Receive messages and report throughput and loss
    Sub(SubArgs),
    /// Run publisher and subscriber in one process over an in-memory bus
    Loopback {
        #[command(flatten)]
        publisher: PubArgs,

        /// Receiver timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Check every payload against the generator pattern
        #[arg(long)]
        verify: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct PubArgs {
    /// Payload size in bytes
    #[arg(short = 's', long)]
    size: Option<usize>,

    /// Number of messages to send
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Target rate in msg/s (0 = unlimited)
    #[arg(short, long)]
    rate: Option<f64>,

    /// Wait before the first send, in milliseconds
    #[arg(long)]
    preroll_ms: Option<u64>,
}

#[derive(ClapArgs, Debug)]
struct SubArgs {
    /// Expected payload size in bytes
    #[arg(short = 's', long)]
    size: Option<usize>,

    /// Number of messages to wait for
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Check every payload against the generator pattern
    #[arg(long)]
    verify: bool,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(args)?;

    match &args.mode {
        Mode::Pub(publisher) => {
            publisher.merge_into(&mut config);
            let transport = UdpTransport::new(config.transport_config()?)?;
            run_pub(&transport, &config.publisher_config()?)
        }
        Mode::Sub(subscriber) => {
            subscriber.merge_into(&mut config);
            let transport = UdpTransport::new(config.transport_config()?)?;
            run_sub(&transport, &config.receiver_config()?, subscriber.verify)
        }
        Mode::Loopback {
            publisher,
            timeout,
            verify,
        } => {
            publisher.merge_into(&mut config);
            // Receiver mirrors the publisher's size and count.
            config.receiver.size = config.publisher.size.or(config.receiver.size);
            config.receiver.count = config.publisher.count.or(config.receiver.count);
            if timeout.is_some() {
                config.receiver.timeout_secs = *timeout;
            }
            run_loopback(&config, *verify)
        }
    }
}

/// Run file (if any) with the global flags applied on top.
fn load_config(args: &Args) -> Result<BenchConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::from_file(path)?,
        None => BenchConfig::default(),
    };
    if args.domain.is_some() {
        config.domain = args.domain;
    }
    if args.topic.is_some() {
        config.topic.clone_from(&args.topic);
    }
    if args.qos.is_some() {
        config.qos.clone_from(&args.qos);
    }
    log::debug!(
        "[CONFIG] domain={:?} topic={:?} qos={:?}",
        config.domain,
        config.topic,
        config.qos
    );
    Ok(config)
}

impl PubArgs {
    fn merge_into(&self, config: &mut BenchConfig) {
        let section = &mut config.publisher;
        section.size = self.size.or(section.size);
        section.count = self.count.or(section.count);
        section.rate = self.rate.or(section.rate);
        section.preroll_ms = self.preroll_ms.or(section.preroll_ms);
    }
}

impl SubArgs {
    fn merge_into(&self, config: &mut BenchConfig) {
        let section = &mut config.receiver;
        section.size = self.size.or(section.size);
        section.count = self.count.or(section.count);
        section.timeout_secs = self.timeout.or(section.timeout_secs);
    }
}

fn print_header(role: &str, qos: QosPreset, topic: &str, domain: u32) {
    println!("{}", qos.banner().cyan());
    println!("{} {} on topic '{}'", ">>>".green().bold(), role, topic);
    println!("    Domain: {}", domain);
}

fn run_pub<T: Transport>(
    transport: &T,
    config: &PublisherConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    print_header("Publishing", config.qos, &config.topic, config.domain_id);
    println!("    Message size: {} bytes", config.size);
    println!("    Message count: {}", config.count);
    println!();

    let report = ddsbench::run_publisher(transport, config)?;
    println!("\n{}", report);
    Ok(())
}

fn receive<T: Transport>(
    transport: &T,
    config: &ReceiverConfig,
    verify: bool,
) -> ddsbench::Result<ReceiverReport> {
    let qos = config.qos.profile();
    let endpoint = transport.connect(config.domain_id, &config.topic, &qos)?;
    Receiver::new(endpoint, config.clone())?
        .verify_payload(verify)
        .run()
}

fn run_sub<T: Transport>(
    transport: &T,
    config: &ReceiverConfig,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    print_header("Subscribing", config.qos, &config.topic, config.domain_id);
    println!("    Expected message size: {} bytes", config.expected_size);
    println!("    Expecting {} messages...", config.expected_count);
    println!("{}", "    Waiting for data...".dimmed());
    println!();

    let report = receive(transport, config, verify)?;
    print_receiver_report(&report);
    Ok(())
}

fn run_loopback(config: &BenchConfig, verify: bool) -> Result<(), Box<dyn std::error::Error>> {
    let publisher = config.publisher_config()?;
    let receiver = config.receiver_config()?;

    let bus = LoopbackTransport::new();
    // Attach the reader before the writer starts so reliable back-pressure
    // applies from the first sample.
    let endpoint = bus.connect(receiver.domain_id, &receiver.topic, &receiver.qos.profile())?;
    let rx = thread::spawn(move || {
        Receiver::new(endpoint, receiver)?
            .verify_payload(verify)
            .run()
    });

    run_pub(&bus, &publisher)?;
    let report = rx.join().map_err(|_| "receiver thread panicked")??;
    println!();
    print_receiver_report(&report);
    Ok(())
}

fn print_receiver_report(report: &ReceiverReport) {
    if report.loss_percent.is_some() || report.corrupted > 0 {
        println!("{}", report.to_string().yellow());
    } else {
        println!("{}", report);
    }
}
