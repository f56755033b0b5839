use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use clap::ValueHint;
use serde_json::Value;
use std::path::PathBuf;

use crate::config::DaemonArgs;
use crate::config::HarnessConfig;
use crate::config::PeerLinks;
use crate::error::Result;

const LONG_ABOUT: &str = "\
Render and launch containerized bcexchanged nodes.\n\
\n\
`command` prints the exact shell invocation a node container would run.\n\
`run` launches one node, waits for its RPC server and blocks until it exits.";

const AFTER_LONG_HELP: &str = r#"EXAMPLES:
    # Show the daemon invocation for a node linked to "seed"
    bcx-node command --name b --link /seed --arg testnet=1

    # Same, as JSON
    bcx-node command --json --links-json '{"/seed": "seed"}'

    # Launch a node and keep it running until the daemon exits
    bcx-node run --name a --arg stakegen=1 --delete-at-exit"#;

#[derive(Parser)]
#[command(name = "bcx-node")]
#[command(author, version, propagate_version = true)]
#[command(about = "Containerized bcexchange node harness")]
#[command(long_about = LONG_ABOUT)]
#[command(after_long_help = AFTER_LONG_HELP)]
#[command(subcommand_required = true, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(
        long,
        global = true,
        value_enum,
        value_name = "FORMAT",
        default_value_t = OutputFormat::Text,
        help_heading = "Output Options"
    )]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true, help_heading = "Output Options")]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true, help_heading = "Debug Options")]
    pub verbose: bool,
}

impl Cli {
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the shell invocation a node container runs
    Command(NodeArgs),

    /// Launch a node, wait for it to boot and block until it exits
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct NodeArgs {
    /// Node name echoed at container start
    #[arg(long)]
    pub name: Option<String>,

    /// Container image
    #[arg(long, value_name = "IMAGE")]
    pub image: Option<String>,

    /// Daemon argument as KEY=VALUE (repeatable; booleans and numbers are typed)
    #[arg(long = "arg", value_name = "KEY=VALUE")]
    pub args: Vec<String>,

    /// Daemon arguments as a JSON object, applied before --arg
    #[arg(long, value_name = "JSON")]
    pub args_json: Option<String>,

    /// Link to a running container by name (repeatable)
    #[arg(long = "link", value_name = "NAME", conflicts_with = "links_json")]
    pub links: Vec<String>,

    /// Links as JSON: an object of name -> alias or an array of names
    #[arg(long, value_name = "JSON")]
    pub links_json: Option<String>,

    /// Daemon option used for peer directives (default: addnode)
    #[arg(long, value_name = "METHOD")]
    pub connect_method: Option<String>,

    /// Use -connect for peer directives, overriding --connect-method
    #[arg(long)]
    pub link_with_connect: bool,

    /// Shell command run before the daemon (repeatable, in order)
    #[arg(long = "before-start", value_name = "CMD")]
    pub before_start: Vec<String>,

    /// Print the container environment before starting
    #[arg(long)]
    pub show_environment: bool,

    /// Delete wallet files before starting the daemon
    #[arg(long)]
    pub remove_wallet_before_startup: bool,

    /// Delete wallet files after the daemon exits
    #[arg(long)]
    pub remove_wallet_after_shutdown: bool,

    /// Keep addr.dat after the daemon exits
    #[arg(long)]
    pub keep_addr: bool,
}

impl NodeArgs {
    pub fn to_config(&self) -> Result<HarnessConfig> {
        let mut config = HarnessConfig::default()
            .with_show_environment(self.show_environment)
            .with_remove_wallet_before_startup(self.remove_wallet_before_startup)
            .with_remove_wallet_after_shutdown(self.remove_wallet_after_shutdown)
            .with_remove_addr_after_shutdown(!self.keep_addr)
            .with_link_with_connect(self.link_with_connect);
        if let Some(name) = &self.name {
            config = config.with_name(name);
        }
        if let Some(image) = &self.image {
            config = config.with_image(image);
        }
        if let Some(raw) = &self.args_json {
            let value: Value = serde_json::from_str(raw)?;
            config = config.with_args(DaemonArgs::from_json(&value)?);
        }
        for raw in &self.args {
            let (key, value) = DaemonArgs::parse_assignment(raw)?;
            config = config.with_arg(key, value);
        }
        if let Some(raw) = &self.links_json {
            let value: Value = serde_json::from_str(raw)?;
            config = config.with_links_json(&value)?;
        } else if !self.links.is_empty() {
            config = config.with_links(PeerLinks::names(self.links.iter().cloned()));
        }
        if let Some(method) = &self.connect_method {
            config = config.with_connect_method(method);
        }
        for command in &self.before_start {
            config = config.with_before_start_command(command);
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Do not bind the source tree at /code
    #[arg(long)]
    pub no_bind_code: bool,

    /// Source tree bound at /code (default: BCX_SOURCE_DIR or the current directory)
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub source_dir: Option<PathBuf>,

    /// Grant the NET_ADMIN capability
    #[arg(long)]
    pub netadmin: bool,

    /// Remove the container when the command finishes
    #[arg(long)]
    pub delete_at_exit: bool,

    /// Seconds to wait for the RPC server (default: BCX_BOOT_TIMEOUT_SECS or 60)
    #[arg(long, value_name = "SECS")]
    pub boot_timeout: Option<u64>,

    /// Commit the container as this image after it exits
    #[arg(long, value_name = "REPO")]
    pub commit: Option<String>,
}

impl RunArgs {
    pub fn to_config(&self) -> Result<HarnessConfig> {
        Ok(self
            .node
            .to_config()?
            .with_bind_code(!self.no_bind_code)
            .with_netadmin(self.netadmin)
            .with_delete_at_exit(self.delete_at_exit))
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
