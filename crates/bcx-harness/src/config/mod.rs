//! Node options and the daemon invocation derived from them.

mod args;
mod command;
mod links;

use serde_json::Value;

pub use args::ArgValue;
pub use args::DaemonArgs;
pub use command::DaemonCommand;
pub use links::CONNECT_METHOD;
pub use links::DEFAULT_CONNECT_METHOD;
pub use links::NamedPeers;
pub use links::PeerLink;
pub use links::PeerLinks;
pub use links::resolve_connect_method;

use crate::error::Result;

pub const DEFAULT_IMAGE: &str = "bcexchange/base";
pub const DATA_DIR: &str = "/root/.bcexchange";
pub const TESTNET_DIR: &str = "/root/.bcexchange/testnet";
pub const DAEMON_BINARY: &str = "./bcexchanged";
pub const WORKING_DIR: &str = "/code";
pub const SHARED_MOUNT: &str = "/shared";

/// Arguments every node starts with unless the scenario overrides them.
/// Testnet, RPC user and password come from the image's config file.
pub fn default_args() -> DaemonArgs {
    DaemonArgs::new()
        .with("datadir", DATA_DIR)
        .with("printtoconsole", true)
        .with("rpcallowip", "*.*.*.*")
        .with("logtimestamps", true)
        .with("keypool", 1)
        .with("stakegen", false)
        .with("unpark", false)
        .with("checkblocks", -1)
}

/// Options for one simulated node. Built once per scenario setup and moved
/// into the harness, which never mutates it.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    image: String,
    name: Option<String>,
    bind_code: bool,
    shutdown_at_exit: bool,
    delete_at_exit: bool,
    remove_addr_after_shutdown: bool,
    remove_wallet_after_shutdown: bool,
    remove_wallet_before_startup: bool,
    show_environment: bool,
    before_start_commands: Vec<String>,
    args: DaemonArgs,
    links: NamedPeers,
    connect_method: Option<String>,
    link_with_connect: bool,
    netadmin: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            name: None,
            bind_code: true,
            shutdown_at_exit: true,
            delete_at_exit: false,
            remove_addr_after_shutdown: true,
            remove_wallet_after_shutdown: false,
            remove_wallet_before_startup: false,
            show_environment: false,
            before_start_commands: Vec::new(),
            args: DaemonArgs::new(),
            links: NamedPeers::default(),
            connect_method: None,
            link_with_connect: false,
            netadmin: false,
        }
    }
}

impl HarnessConfig {
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bind_code(&self) -> bool {
        self.bind_code
    }

    pub fn shutdown_at_exit(&self) -> bool {
        self.shutdown_at_exit
    }

    pub fn delete_at_exit(&self) -> bool {
        self.delete_at_exit
    }

    pub fn remove_addr_after_shutdown(&self) -> bool {
        self.remove_addr_after_shutdown
    }

    pub fn remove_wallet_after_shutdown(&self) -> bool {
        self.remove_wallet_after_shutdown
    }

    pub fn remove_wallet_before_startup(&self) -> bool {
        self.remove_wallet_before_startup
    }

    pub fn show_environment(&self) -> bool {
        self.show_environment
    }

    pub fn before_start_commands(&self) -> &[String] {
        &self.before_start_commands
    }

    /// Caller-supplied arguments only; see [`Self::effective_args`].
    pub fn args(&self) -> &DaemonArgs {
        &self.args
    }

    pub fn effective_args(&self) -> DaemonArgs {
        self.args.merged_over(&default_args())
    }

    pub fn links(&self) -> &NamedPeers {
        &self.links
    }

    pub fn connect_method(&self) -> &str {
        resolve_connect_method(self.connect_method.as_deref(), self.link_with_connect)
    }

    pub fn netadmin(&self) -> bool {
        self.netadmin
    }

    pub fn daemon_command(&self) -> DaemonCommand {
        DaemonCommand::from_config(self)
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_bind_code(mut self, bind_code: bool) -> Self {
        self.bind_code = bind_code;
        self
    }

    pub fn with_shutdown_at_exit(mut self, enabled: bool) -> Self {
        self.shutdown_at_exit = enabled;
        self
    }

    pub fn with_delete_at_exit(mut self, enabled: bool) -> Self {
        self.delete_at_exit = enabled;
        self
    }

    pub fn with_remove_addr_after_shutdown(mut self, enabled: bool) -> Self {
        self.remove_addr_after_shutdown = enabled;
        self
    }

    pub fn with_remove_wallet_after_shutdown(mut self, enabled: bool) -> Self {
        self.remove_wallet_after_shutdown = enabled;
        self
    }

    pub fn with_remove_wallet_before_startup(mut self, enabled: bool) -> Self {
        self.remove_wallet_before_startup = enabled;
        self
    }

    pub fn with_show_environment(mut self, enabled: bool) -> Self {
        self.show_environment = enabled;
        self
    }

    pub fn with_before_start_command(mut self, command: impl Into<String>) -> Self {
        self.before_start_commands.push(command.into());
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.set(key, value);
        self
    }

    pub fn with_args(mut self, args: DaemonArgs) -> Self {
        for (key, value) in args.iter() {
            self.args.set(key, value.clone());
        }
        self
    }

    pub fn with_links(mut self, links: PeerLinks) -> Self {
        self.links = links.into_named();
        self
    }

    /// Accepts the untyped link shapes scenario files use.
    pub fn with_links_json(self, links: &Value) -> Result<Self> {
        Ok(self.with_links(PeerLinks::from_json(links)?))
    }

    pub fn with_connect_method(mut self, method: impl Into<String>) -> Self {
        self.connect_method = Some(method.into());
        self
    }

    pub fn with_link_with_connect(mut self, enabled: bool) -> Self {
        self.link_with_connect = enabled;
        self
    }

    pub fn with_netadmin(mut self, enabled: bool) -> Self {
        self.netadmin = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use serde_json::json;

    #[test]
    fn test_default_flags() {
        let config = HarnessConfig::default();
        assert_eq!(config.image(), "bcexchange/base");
        assert!(config.bind_code());
        assert!(config.shutdown_at_exit());
        assert!(!config.delete_at_exit());
        assert!(config.remove_addr_after_shutdown());
        assert!(!config.remove_wallet_after_shutdown());
        assert!(!config.remove_wallet_before_startup());
        assert!(config.before_start_commands().is_empty());
        assert_eq!(config.connect_method(), "addnode");
    }

    #[test]
    fn test_scenario_arguments_merge_under_defaults() {
        let config = HarnessConfig::default()
            .with_arg("testnet", 1)
            .with_arg("server", true)
            .with_arg("rpcuser", "alice");
        let tokens = config.effective_args().to_tokens();

        assert_eq!(&tokens[..3], &["-testnet=1", "-server", "-rpcuser=\"alice\""]);
        assert_eq!(tokens[3], "-datadir=\"/root/.bcexchange\"");
        assert_eq!(tokens.len(), 3 + default_args().len());
    }

    #[test]
    fn test_override_replaces_default_value() {
        let config = HarnessConfig::default().with_arg("stakegen", true);
        let tokens = config.effective_args().to_tokens();
        assert!(tokens.contains(&"-stakegen".to_string()));
        assert!(!tokens.contains(&"-stakegen=0".to_string()));
        assert_eq!(tokens.len(), default_args().len());
        assert_eq!(config.args().len(), 1);
    }

    #[test]
    fn test_links_json_rejects_scalar() {
        let err = HarnessConfig::default()
            .with_links_json(&json!(42))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Configuration { .. }));
    }

    #[test]
    fn test_explicit_connect_method() {
        let config = HarnessConfig::default().with_connect_method("seednode");
        assert_eq!(config.connect_method(), "seednode");
        let config = config.with_link_with_connect(true);
        assert_eq!(config.connect_method(), "connect");
    }
}
