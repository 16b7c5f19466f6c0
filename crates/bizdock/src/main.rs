mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bizdock_core::kernel::bootstrap::load_settings;
use bizdock_core::kernel::constants::DEFAULT_SETTINGS_FILE;
use bizdock_core::plugin_system::InMemoryPluginStore;
use bizdock_core::web_command::{ParamValue, Principal};
use bizdock_core::{Application, ClassRegistry, PluginManager, PluginStatus, RequestContext, RuntimeSettings};
use clap::{Parser, Subcommand};
use log::{debug, error, info};

/// BizDock: extension and plugin runtime
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Simple liveness check, does not start the runtime
    #[arg(long)]
    ping: bool,

    /// Settings file (JSON, YAML or TOML), `bizdock.toml` if present
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Directory scanned for bundles, overrides the settings file
    #[arg(long, global = true)]
    extensions: Option<PathBuf>,

    /// Root of the plugin shared storage, overrides the settings file
    #[arg(long, global = true)]
    shared_storage: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the loaded extensions and their plugins
    Extensions,
    /// List the registered plugin configurations
    Plugins,
    /// Execute a web command and print its result
    Execute {
        /// Command path, relative to the extension prefix
        path: String,
        /// HTTP method of the request
        #[arg(long, default_value = "GET")]
        method: String,
        /// Permission held by the caller, may be repeated
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },
    /// Print the link of a command
    Link {
        /// Controller key (class name of a standalone controller)
        controller: String,
        /// Command identifier
        command: String,
        /// Command parameters, in declaration order
        params: Vec<String>,
    },
    /// Write the bundle of the sample extension into the extension directory
    InstallSample {
        /// Auto-register (and autostart) the sample connector
        #[arg(long)]
        auto_register: bool,
    },
    /// Start the runtime and wait for ctrl-c
    Run,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    let settings = match settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load the settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!("Runtime settings: {:?}", settings);

    if let Some(Commands::InstallSample { auto_register }) = &args.command {
        return match sample_extension::write_bundle(&settings.extension_directory, *auto_register) {
            Ok(path) => {
                println!("Installed {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to install the sample bundle: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let classes = sample_extension::register(ClassRegistry::builder()).build();
    let mut app = Application::new(settings, classes, Arc::new(InMemoryPluginStore::new()));

    if let Some(Commands::Run) = args.command {
        info!("BizDock is running, press ctrl-c to stop");
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for ctrl-c: {}", e);
            }
        };
        return match app.run_until(ctrl_c).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Application error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Err(e) = app.start().await {
        eprintln!("Failed to start the application: {}", e);
        return ExitCode::FAILURE;
    }

    let code = match args.command {
        Some(command) => run_command(&app, command).await,
        None => {
            println!("No command specified, see --help");
            ExitCode::SUCCESS
        }
    };

    if let Err(e) = app.shutdown().await {
        eprintln!("Error while shutting down: {}", e);
        return ExitCode::FAILURE;
    }
    code
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn settings(args: &CliArgs) -> bizdock_core::kernel::Result<RuntimeSettings> {
    let default_file = PathBuf::from(DEFAULT_SETTINGS_FILE);
    let mut settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None if default_file.is_file() => load_settings(&default_file)?,
        None => RuntimeSettings::default(),
    };
    if let Some(directory) = &args.extensions {
        settings.extension_directory = directory.clone();
    }
    if let Some(directory) = &args.shared_storage {
        settings.shared_storage = directory.clone();
    }
    Ok(settings)
}

async fn run_command(app: &Application, command: Commands) -> ExitCode {
    match command {
        Commands::Extensions => {
            let extensions = match app.extension_manager().await {
                Ok(manager) => manager.loaded_extensions().await,
                Err(e) => return failure(e),
            };
            print!("{}", cli::render_extensions(&extensions));
            ExitCode::SUCCESS
        }
        Commands::Plugins => {
            let manager = match app.plugin_manager().await {
                Ok(manager) => manager,
                Err(e) => return failure(e),
            };
            // Let autostarted plugins leave their transient states
            let settled = tokio::time::timeout(Duration::from_secs(5), async {
                while manager
                    .registered_plugins()
                    .await
                    .iter()
                    .any(|p| matches!(p.status, PluginStatus::Starting | PluginStatus::Stopping))
                {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await;
            if settled.is_err() {
                debug!("Some plugins are still starting or stopping");
            }
            print!("{}", cli::render_plugins(&manager.registered_plugins().await));
            ExitCode::SUCCESS
        }
        Commands::Execute {
            path,
            method,
            permissions,
        } => {
            let manager = match app.extension_manager().await {
                Ok(manager) => manager,
                Err(e) => return failure(e),
            };
            let mut request = RequestContext::new(method);
            if !permissions.is_empty() {
                let principal = permissions
                    .into_iter()
                    .fold(Principal::new("cli"), |p, permission| p.with_permission(permission));
                request = request.with_principal(principal);
            }
            let result = manager.execute(&path, &request).await;
            if result.is_bad_request() {
                eprintln!("bad request: {}", path);
                return ExitCode::FAILURE;
            }
            println!("{}", result.body);
            ExitCode::SUCCESS
        }
        Commands::Link {
            controller,
            command,
            params,
        } => {
            let manager = match app.extension_manager().await {
                Ok(manager) => manager,
                Err(e) => return failure(e),
            };
            let params: Vec<ParamValue> = params.iter().map(|p| parse_param(p)).collect();
            match manager.link(&controller, &command, &params).await {
                Ok(link) => {
                    println!("{}", link);
                    ExitCode::SUCCESS
                }
                Err(e) => failure(e),
            }
        }
        Commands::InstallSample { .. } | Commands::Run => ExitCode::SUCCESS,
    }
}

/// Numbers become long parameters, anything else text
fn parse_param(raw: &str) -> ParamValue {
    match raw.parse::<i64>() {
        Ok(value) => ParamValue::Long(value),
        Err(_) => ParamValue::Text(raw.to_string()),
    }
}

fn failure(e: impl std::fmt::Display) -> ExitCode {
    eprintln!("Error: {}", e);
    ExitCode::FAILURE
}
