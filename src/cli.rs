//! Command-line flags. Every flag falls back to its `SSH_*` environment
//! variable when omitted.

use std::path::PathBuf;

use clap::Parser;
use ssh_probe::probe::config::Overrides;

#[derive(Debug, Parser)]
#[command(name = "ssh-probe")]
#[command(about = "Check SSH reachability and authentication, or open an interactive shell")]
#[command(version)]
pub struct Cli {
    /// Remote host name or address [env: SSH_HOST]
    #[arg(long)]
    pub host: Option<String>,

    /// Remote port, 22 when empty [env: SSH_PORT]
    #[arg(short, long)]
    pub port: Option<String>,

    /// Login user [env: SSH_USER]
    #[arg(short, long)]
    pub user: Option<String>,

    /// Private key file, exclusive with --password [env: SSH_KEY_PATH]
    #[arg(short = 'i', long = "key")]
    pub key: Option<PathBuf>,

    /// Password, exclusive with --key [env: SSH_PASSWORD]
    #[arg(long)]
    pub password: Option<String>,

    /// Connect timeout in seconds [env: SSH_CONNECT_TIMEOUT]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// known_hosts file used to verify the host key [env: SSH_KNOWN_HOSTS]
    #[arg(long, conflicts_with = "insecure")]
    pub known_hosts: Option<PathBuf>,

    /// Accept any host key [env: SSH_INSECURE]
    #[arg(long)]
    pub insecure: bool,

    /// Command run by the probe [env: SSH_PROBE_COMMAND]
    #[arg(long, conflicts_with = "shell")]
    pub command: Option<String>,

    /// Open an interactive shell instead of running the probe command
    #[arg(long)]
    pub shell: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn into_overrides(self) -> Overrides {
        Overrides {
            host: self.host,
            port: self.port,
            user: self.user,
            key_path: self.key,
            password: self.password,
            connect_timeout_secs: self.timeout,
            known_hosts: self.known_hosts,
            insecure: self.insecure.then_some(true),
            probe_command: self.command,
            shell: self.shell,
        }
    }
}
