//! propctl - command-line front end
//!
//! Thin CRUD surface over the library: read or edit a property file,
//! restore its backup, or show the mount table. All the interesting work
//! happens in the library; this binary parses arguments, wires up logging
//! and configuration, and prints one outcome line.

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use propctl::config::ConfigLoader;
use propctl::{Config, PrivilegedShell, PropertyEditor, PropertyFile};

/// Parsed command line
#[derive(Debug)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Property file to operate on (config default when unset)
    file: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
    /// Subcommand and its operands
    command: CliCommand,
}

#[derive(Debug)]
enum CliCommand {
    Get { key: String },
    Set { key: String, value: String },
    Del { key: String },
    List,
    Restore,
    Mounts,
}

const USAGE: &str = "\
usage: propctl [--config <file>] [--file <properties>] [--debug] <command>

commands:
  get <key>          print one property value
  set <key> <value>  set a property and install the file (needs root)
  del <key>          delete a property and install the file (needs root)
  list               print all properties
  restore            put the .bak backup back in place (needs root)
  mounts             print the mount table";

impl AppArgs {
    /// Parse command line arguments
    fn parse() -> anyhow::Result<Self> {
        let args: Vec<String> = env::args().collect();
        let mut config_path = None;
        let mut file = None;
        let mut debug = false;
        let mut rest: Vec<String> = Vec::new();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    let value = args.get(i).context("missing config file path")?;
                    config_path = Some(PathBuf::from(value));
                }
                "--file" | "-f" => {
                    i += 1;
                    let value = args.get(i).context("missing properties file path")?;
                    file = Some(PathBuf::from(value));
                }
                "--debug" | "-d" => debug = true,
                "--help" | "-h" => {
                    println!("{USAGE}");
                    process::exit(0);
                }
                other => rest.push(other.to_string()),
            }
            i += 1;
        }

        let mut rest = rest.into_iter();
        let command = match rest.next().as_deref() {
            Some("get") => CliCommand::Get {
                key: rest.next().context("get needs a key")?,
            },
            Some("set") => CliCommand::Set {
                key: rest.next().context("set needs a key")?,
                value: rest.next().context("set needs a value")?,
            },
            Some("del") => CliCommand::Del {
                key: rest.next().context("del needs a key")?,
            },
            Some("list") => CliCommand::List,
            Some("restore") => CliCommand::Restore,
            Some("mounts") => CliCommand::Mounts,
            Some(other) => bail!("unknown command '{other}'\n{USAGE}"),
            None => bail!("{USAGE}"),
        };

        Ok(Self {
            config_path,
            file,
            debug,
            command,
        })
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "propctl=debug" } else { "propctl=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &AppArgs) -> anyhow::Result<Config> {
    match &args.config_path {
        Some(path) => ConfigLoader::load_from(path).context("loading configuration"),
        None => ConfigLoader::new().load().context("loading configuration"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse()?;
    init_logging(args.debug);

    let config = load_config(&args)?;
    let properties_path = args
        .file
        .clone()
        .unwrap_or_else(|| config.editor.properties_path.clone());

    match args.command {
        CliCommand::Get { key } => {
            let file = PropertyFile::load(&properties_path)?;
            match file.get(&key) {
                Some(value) => println!("{value}"),
                None => process::exit(1),
            }
        }
        CliCommand::List => {
            let file = PropertyFile::load(&properties_path)?;
            for key in file.keys() {
                println!("{}={}", key, file.get(key).unwrap_or(""));
            }
        }
        CliCommand::Mounts => {
            let mut table = propctl::MountTable::new(config.mounts.table_path.clone());
            table.refresh()?;
            for entry in table.entries() {
                println!(
                    "{} {} {} {}",
                    entry.device(),
                    entry.mount_point(),
                    entry.fs_type(),
                    entry.flags().join(",")
                );
            }
        }
        CliCommand::Set { key, value } => {
            let mut file = PropertyFile::load(&properties_path)?;
            file.set(&key, &value);
            if !file.is_modified() {
                println!("{key} already set");
                return Ok(());
            }
            edit(&config, &file, &properties_path).await?;
        }
        CliCommand::Del { key } => {
            let mut file = PropertyFile::load(&properties_path)?;
            if !file.remove(&key) {
                bail!("no such property: {key}");
            }
            edit(&config, &file, &properties_path).await?;
        }
        CliCommand::Restore => {
            let mut shell = PrivilegedShell::connect(&config).await;
            let editor = PropertyEditor::new(&config.editor);
            let outcome = editor.restore(&shell, &properties_path).await;
            shell.close().await;
            println!("{}", outcome.message);
            if !outcome.ok {
                process::exit(1);
            }
        }
    }
    Ok(())
}

/// Install an edited property file through a fresh privileged session.
async fn edit(
    config: &Config,
    file: &PropertyFile,
    path: &std::path::Path,
) -> anyhow::Result<()> {
    let mut shell = PrivilegedShell::connect(config).await;
    let editor = PropertyEditor::new(&config.editor);
    let outcome = editor.save(&shell, file, path).await;
    shell.close().await;
    println!("{}", outcome.message);
    if !outcome.ok {
        process::exit(1);
    }
    Ok(())
}
