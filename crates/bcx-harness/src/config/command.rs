//! Shell invocation that boots the daemon inside the container.

use crate::config::DAEMON_BINARY;
use crate::config::HarnessConfig;
use crate::config::TESTNET_DIR;

const SHELL_WRAPPER: [&str; 5] = ["stdbuf", "-oL", "-eL", "/bin/bash", "-c"];

/// CLI tokens plus the ordered shell steps wrapped around the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonCommand {
    cli_tokens: Vec<String>,
    steps: Vec<String>,
}

impl DaemonCommand {
    pub fn from_config(config: &HarnessConfig) -> Self {
        let mut cli_tokens = config.effective_args().to_tokens();
        cli_tokens.extend(config.links().connect_directives(config.connect_method()));

        let mut steps = Vec::new();
        if let Some(name) = config.name() {
            steps.push(format!("echo Node name: {name}"));
        }
        steps.push("set -x".to_string());
        if config.show_environment() {
            steps.push("echo Environment:".to_string());
            steps.push("env".to_string());
        }
        if config.remove_wallet_before_startup() {
            steps.push(format!("rm -f {TESTNET_DIR}/wallet*.dat"));
        }
        steps.extend(config.before_start_commands().iter().cloned());
        steps.push(format!("{DAEMON_BINARY} {}", cli_tokens.join(" ")));
        if config.remove_addr_after_shutdown() {
            steps.push(format!("rm {TESTNET_DIR}/addr.dat"));
        }
        if config.remove_wallet_after_shutdown() {
            steps.push(format!("rm {TESTNET_DIR}/wallet*.dat"));
        }

        Self { cli_tokens, steps }
    }

    pub fn cli_tokens(&self) -> &[String] {
        &self.cli_tokens
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn script(&self) -> String {
        self.steps.join("; ")
    }

    /// Container command: line-buffered bash running the whole script.
    pub fn argv(&self) -> Vec<String> {
        let mut argv: Vec<String> = SHELL_WRAPPER.iter().map(|s| s.to_string()).collect();
        argv.push(self.script());
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerLinks;

    #[test]
    fn test_default_script() {
        let command = DaemonCommand::from_config(&HarnessConfig::default());
        assert_eq!(
            command.script(),
            "set -x; ./bcexchanged -datadir=\"/root/.bcexchange\" -printtoconsole \
             -rpcallowip=\"*.*.*.*\" -logtimestamps -keypool=1 -stakegen=0 -unpark=0 \
             -checkblocks=-1; rm /root/.bcexchange/testnet/addr.dat"
        );
    }

    #[test]
    fn test_full_step_order() {
        let config = HarnessConfig::default()
            .with_name("alice")
            .with_show_environment(true)
            .with_remove_wallet_before_startup(true)
            .with_before_start_command("cp /shared/wallet.dat /root/.bcexchange/testnet/")
            .with_remove_addr_after_shutdown(false)
            .with_remove_wallet_after_shutdown(true);
        let command = DaemonCommand::from_config(&config);
        let steps = command.steps();

        assert_eq!(steps[0], "echo Node name: alice");
        assert_eq!(steps[1], "set -x");
        assert_eq!(steps[2], "echo Environment:");
        assert_eq!(steps[3], "env");
        assert_eq!(steps[4], "rm -f /root/.bcexchange/testnet/wallet*.dat");
        assert_eq!(steps[5], "cp /shared/wallet.dat /root/.bcexchange/testnet/");
        assert!(steps[6].starts_with("./bcexchanged -datadir="));
        assert_eq!(steps[7], "rm /root/.bcexchange/testnet/wallet*.dat");
        assert_eq!(steps.len(), 8);
    }

    #[test]
    fn test_connect_directives_follow_arguments() {
        let config = HarnessConfig::default()
            .with_links(PeerLinks::names(["/A"]))
            .with_link_with_connect(true);
        let command = DaemonCommand::from_config(&config);
        let tokens = command.cli_tokens();
        assert_eq!(
            tokens.last().map(String::as_str),
            Some("-connect=$A_PORT_12239_TCP_ADDR:$A_PORT_12239_TCP_PORT")
        );
    }

    #[test]
    fn test_argv_wraps_script_in_unbuffered_bash() {
        let command = DaemonCommand::from_config(&HarnessConfig::default());
        let argv = command.argv();
        assert_eq!(&argv[..5], &["stdbuf", "-oL", "-eL", "/bin/bash", "-c"]);
        assert_eq!(argv[5], command.script());
        assert_eq!(argv.len(), 6);
    }
}
