//! Service configuration for civic-ir
//!
//! Every setting resolves command line, then environment (both through
//! clap), then the TOML file, then the compiled default.

use civic_common::config::{
    load_module_config, resolve_root_folder, CompiledDefaults, TomlConfig, ROOT_FOLDER_ENV,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Module name, also the TOML file stem
pub const MODULE_NAME: &str = "civic-ir";

/// Command-line arguments for civic-ir
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "civic-ir")]
#[command(about = "Civic issue reporting and analytics service")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "CIVIC_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "CIVIC_HOST")]
    pub host: Option<String>,

    /// Root folder holding the database and uploads
    #[arg(short, long, env = "CIVIC_ROOT_FOLDER")]
    pub root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "CIVIC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Classifier endpoint URL
    #[arg(long, env = "CIVIC_CLASSIFIER_URL")]
    pub classifier_url: Option<String>,

    /// Classifier deadline in milliseconds
    #[arg(long, env = "CIVIC_CLASSIFIER_TIMEOUT_MS")]
    pub classifier_timeout_ms: Option<u64>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub classifier_url: String,
    pub classifier_timeout: Duration,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl ServiceConfig {
    /// Load the TOML file named by `args` (or found on the search path) and resolve
    pub fn load(args: &Args) -> civic_common::Result<Self> {
        let toml = load_module_config(args.config.as_deref(), MODULE_NAME)?;
        Ok(Self::resolve(args, &toml, &CompiledDefaults::for_current_platform()))
    }

    pub fn resolve(args: &Args, toml: &TomlConfig, defaults: &CompiledDefaults) -> Self {
        let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, toml);

        let timeout_ms = args
            .classifier_timeout_ms
            .or(toml.classifier.timeout_ms)
            .unwrap_or(defaults.classifier_timeout_ms);

        Self {
            root_folder,
            host: args
                .host
                .clone()
                .or_else(|| toml.server.host.clone())
                .unwrap_or_else(|| defaults.host.clone()),
            port: args.port.or(toml.server.port).unwrap_or(defaults.port),
            classifier_url: args
                .classifier_url
                .clone()
                .or_else(|| toml.classifier.url.clone())
                .unwrap_or_else(|| defaults.classifier_url.clone()),
            classifier_timeout: civic_common::time::millis_to_duration(timeout_ms),
            max_upload_bytes: toml.uploads.max_bytes.unwrap_or(defaults.max_upload_bytes),
            log_level: toml
                .logging
                .level
                .clone()
                .unwrap_or_else(|| defaults.log_level.clone()),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
