use clap::{ArgAction, Args, Parser, Subcommand};

/// Scanward dashboard session command
#[derive(Parser, Debug)]
#[command(version, propagate_version = true, subcommand_required = true)]
pub struct ScanwardCommand {
    /// Global options
    #[command(flatten)]
    pub options: GlobalOptions,
    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Global options
#[derive(Args, Debug)]
pub struct GlobalOptions {
    /// Backend API base url
    #[arg(long, global = true)]
    pub api_url: Option<String>,
    /// Keep the session in memory only, nothing is persisted
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub ephemeral: bool,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and open the landing view for your role
    Login(LoginArgs),
    /// Log out and forget the stored session
    Logout,
    /// Show who is logged in
    Whoami,
    /// Navigate to a dashboard path
    Open(OpenArgs),
    /// Authenticated GET against the backend, printed as JSON
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Username or email
    #[arg(long, short)]
    pub identifier: Option<String>,
    /// Password (prompted when absent)
    #[arg(long, env = "SCANWARD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Dashboard path, e.g. /scan/pdf
    pub path: String,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// API path relative to the base url, e.g. /scans/history
    pub path: String,
}

/// Parse command line args
pub fn parse() -> ScanwardCommand {
    ScanwardCommand::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open() {
        let cmd = ScanwardCommand::try_parse_from(["scanward", "open", "/scan/pdf"]).unwrap();
        match cmd.command {
            Command::Open(args) => assert_eq!(args.path, "/scan/pdf"),
            other => panic!("unexpected command {:?}", other),
        }
        assert!(!cmd.options.ephemeral);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cmd = ScanwardCommand::try_parse_from([
            "scanward",
            "login",
            "--identifier",
            "analyst",
            "--ephemeral",
            "--api-url",
            "http://backend/api",
        ])
        .unwrap();
        assert!(cmd.options.ephemeral);
        assert_eq!(cmd.options.api_url.as_deref(), Some("http://backend/api"));
        match cmd.command {
            Command::Login(args) => assert_eq!(args.identifier.as_deref(), Some("analyst")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(ScanwardCommand::try_parse_from(["scanward"]).is_err());
    }
}
