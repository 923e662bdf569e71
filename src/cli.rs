use anyhow::Result;
use clap::{ArgAction, Parser};

use crate::{
    commands::{ListMfaCommand, ListRolesCommand, RunCommand},
    constants,
};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "aws-runas",
    version,
    about = "Create an environment for interacting with the AWS API using an assumed role",
    long_about = None
)]
pub struct Cli {
    #[arg(short = 'l', long, help = "List role ARNs you are able to assume")]
    pub list_roles: bool,

    #[arg(
        short = 'm',
        long,
        help = "List the ARN of the MFA device associated with the account"
    )]
    pub list_mfa: bool,

    #[arg(short = 'e', long, help = "Show token expiration time")]
    pub expiration: bool,

    #[arg(short = 's', long, help = "Print eval()-able session token info")]
    pub session: bool,

    #[arg(short = 'r', long, help = "Force a refresh of the cached credentials")]
    pub refresh: bool,

    #[arg(short = 'v', long, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[arg(help = "Name of profile")]
    pub profile: Option<String>,

    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        help = "Command to execute using configured profile"
    )]
    pub cmd: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Commands {
    ListMfa(ListMfaCommand),
    ListRoles(ListRolesCommand),
    Run(RunCommand),
}

impl Cli {
    /// Listing flags take precedence over running a command
    pub fn action(&self) -> Commands {
        if self.list_mfa {
            Commands::ListMfa(ListMfaCommand)
        } else if self.list_roles {
            Commands::ListRoles(ListRolesCommand)
        } else {
            Commands::Run(RunCommand {
                refresh: self.refresh,
                session: self.session,
                expiration: self.expiration,
                cmd: self.cmd.clone(),
            })
        }
    }

    pub async fn execute(self) -> Result<()> {
        let profile = constants::resolve_profile(self.profile.as_deref());

        match self.action() {
            Commands::ListMfa(cmd) => cmd.execute(&profile).await,
            Commands::ListRoles(cmd) => cmd.execute(&profile).await,
            Commands::Run(cmd) => cmd.execute(&profile).await,
        }
    }
}
