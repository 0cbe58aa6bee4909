//! Config Synth CLI
//!
//! Usage:
//!   config-synth [OPTIONS] <COMMAND>
//!
//! Commands:
//!   render     Render a template and print the decoded configuration
//!   match      Check tags against the configured constraints
//!   templates  List bundled templates
//!   functions  List template functions

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use config_synth::{
    build_function_namespace, AssetStore, Constraint, EmbeddedAssets, FuncMap, ProviderConfig,
    TomlDecoder,
};

#[derive(Parser)]
#[command(name = "config-synth")]
#[command(about = "Render provider templates into typed configuration")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template and print the decoded configuration as TOML
    Render {
        /// Bundled template name (ending in .tmpl) or literal template text
        template: String,

        /// Provider configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Template data (JSON); defaults to an empty object
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Override template file, takes precedence over TEMPLATE
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print the rendered text without decoding it
        #[arg(long)]
        raw: bool,

        /// Log the rendered template before decoding
        #[arg(long)]
        debug_template: bool,
    },

    /// Check tags against the provider constraints
    Match {
        /// Tags of the entity being filtered
        tags: Vec<String>,

        /// Provider configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Extra constraint, e.g. `tag==api` (repeatable)
        #[arg(long = "constraint")]
        constraints: Vec<Constraint>,
    },

    /// List templates bundled with the binary
    Templates,

    /// List every function available to templates
    Functions,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Render {
            template,
            config,
            data,
            file,
            raw,
            debug_template,
        } => {
            let mut provider = load_config(config.as_deref());
            if let Some(file) = file {
                provider = provider.with_filename(file);
            }
            if debug_template {
                provider = provider.with_debug_log_generated_template(true);
            }
            let data = load_data(data.as_deref());
            render(&provider, &template, &data, raw);
        }
        Command::Match {
            tags,
            config,
            constraints,
        } => {
            let mut provider = load_config(config.as_deref());
            provider.constraints.extend(constraints);
            match provider.match_constraints(&tags) {
                (true, _) => println!("matched"),
                (false, failing) => {
                    match failing {
                        Some(constraint) => println!("rejected by constraint {}", constraint),
                        None => println!("rejected"),
                    }
                    process::exit(1);
                }
            }
        }
        Command::Templates => {
            for name in EmbeddedAssets.names() {
                println!("{}", name);
            }
        }
        Command::Functions => {
            let mut names: Vec<String> = build_function_namespace(&FuncMap::new())
                .into_keys()
                .collect();
            names.sort();
            for name in names {
                println!("{}", name);
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> ProviderConfig {
    match path {
        Some(path) => match ProviderConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading provider configuration '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => ProviderConfig::default(),
    }
}

fn load_data(path: Option<&Path>) -> Value {
    let Some(path) = path else {
        return Value::Object(Default::default());
    };
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading data file '{}': {}", path.display(), e);
            process::exit(1);
        }
    };
    match serde_json::from_str(&content) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error parsing data file '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn render(provider: &ProviderConfig, template: &str, data: &Value, raw: bool) {
    let funcs = FuncMap::new();
    let output = if raw {
        provider.render(&EmbeddedAssets, template, &funcs, data)
    } else {
        provider
            .get_configuration_with::<toml::Table, _>(&EmbeddedAssets, &TomlDecoder, template, &funcs, data)
            // A table decoded from TOML always re-encodes
            .map(|table| toml::to_string_pretty(&table).unwrap_or_else(|_| table.to_string()))
    };

    match output {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("{}", e.format());
            process::exit(1);
        }
    }
}
