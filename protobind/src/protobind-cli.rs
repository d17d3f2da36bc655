use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use protobind::common::config::{ConfigLoader, TomlConfigLoader};
use protobind::common::constants::PROTOBIND_VERSION;
use protobind::common::log;
use protobind::proto::host::ContractSet;
use protobind::{ConversionReport, Converter};

#[derive(Parser, Debug)]
#[command(name = "protobind-cli", author, version = PROTOBIND_VERSION, about, long_about = None)]
struct Cli {
    /// contract set describing messages, enums, interfaces and classes
    #[arg(short, long)]
    contracts: PathBuf,

    #[arg(short = 'f', long, help = "converter config file")]
    config: Option<PathBuf>,

    #[arg(long, help = "override the schema package")]
    package: Option<String>,

    #[arg(short, long, default_value = "false", help = "verbose output")]
    verbose: bool,

    #[command(subcommand)]
    sub_command: SubCommand,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    #[command(about = "print the proto3 schema of each service")]
    Schema(ServiceArgs),
    #[command(about = "print the route table of each service")]
    Routes(ServiceArgs),
    #[command(about = "check that route tables and schemas agree")]
    Check(ServiceArgs),
}

#[derive(clap::Args, Debug)]
struct ServiceArgs {
    /// services to convert, defaults to the activation list of the config
    services: Vec<String>,
}

fn print_errors(report: &ConversionReport) {
    for e in &report.errors {
        eprintln!("error: {}", e);
    }
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TomlConfigLoader::new(path)?,
        None => TomlConfigLoader::default(),
    };
    if cli.package.is_some() {
        config.set_package(cli.package.clone());
    }
    if cli.verbose {
        log::init(&config)?;
    }

    let contracts_str = std::fs::read_to_string(&cli.contracts)
        .with_context(|| format!("failed to read contracts: {:?}", cli.contracts))?;
    let contracts = ContractSet::from_toml(&contracts_str)
        .with_context(|| format!("invalid contracts: {:?}", cli.contracts))?;
    let converter = Converter::from_config(Arc::new(contracts), &config);

    let (SubCommand::Schema(args) | SubCommand::Routes(args) | SubCommand::Check(args)) =
        &cli.sub_command;
    let report = converter.convert_services(&args.services)?;
    print_errors(&report);

    match &cli.sub_command {
        SubCommand::Schema(_) => {
            for converted in &report.services {
                print!("{}", converted.schema.text);
            }
        }
        SubCommand::Routes(_) => {
            for converted in &report.services {
                for entry in converted.routes.iter() {
                    println!(
                        "{}\t{}\t{}\t{}",
                        entry.full_path, entry.request_type, entry.response_type, entry.shape
                    );
                }
            }
        }
        SubCommand::Check(_) => {
            for converted in &report.services {
                Converter::verify_consistency(&converted.routes, &converted.schema)?;
                println!(
                    "{}: {} routes consistent",
                    converted.service.proto_name(),
                    converted.routes.len()
                );
            }
        }
    }

    if !report.errors.is_empty() {
        anyhow::bail!("{} error(s) during conversion", report.errors.len());
    }
    Ok(())
}
