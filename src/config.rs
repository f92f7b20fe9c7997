use std::env;

use argh::FromArgs;
use tracing::level_filters::LevelFilter;

pub const LOG_VAR: &str = "WISH_LOG";
pub const PROMPT_VAR: &str = "WISH_PROMPT";

#[derive(FromArgs, Debug, Default)]
/// A small job-control shell.
pub struct Args {
    /// run the given command line(s) instead of reading a terminal
    #[argh(option, short = 'c')]
    pub command: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub script: Option<String>,
    pub interactive: bool,
    pub log_level: LevelFilter,
    pub prompt: Option<String>,
}

impl Config {
    pub fn from_env(args: Args) -> Self {
        Self::from_parts(args, atty::is(atty::Stream::Stdin), env::var(LOG_VAR).ok(), env::var(PROMPT_VAR).ok())
    }

    pub fn from_parts(args: Args, stdin_is_tty: bool, log: Option<String>, prompt: Option<String>) -> Self {
        // unknown levels fall back to silence rather than noise on stderr
        let log_level = log.and_then(|l| l.trim().parse::<LevelFilter>().ok()).unwrap_or(LevelFilter::OFF);
        Config { interactive: stdin_is_tty && args.command.is_none(), script: args.command, log_level, prompt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_disables_interactivity() {
        let c = Config::from_parts(Args { command: Some("ls".into()) }, true, None, None);
        assert!(!c.interactive);
        assert_eq!(c.script.as_deref(), Some("ls"));
    }

    #[test]
    fn terminal_without_script_is_interactive() {
        assert!(Config::from_parts(Args::default(), true, None, None).interactive);
        assert!(!Config::from_parts(Args::default(), false, None, None).interactive);
    }

    #[test]
    fn log_level_from_env() {
        assert_eq!(Config::from_parts(Args::default(), false, Some("debug".into()), None).log_level, LevelFilter::DEBUG);
        assert_eq!(Config::from_parts(Args::default(), false, Some("bogus".into()), None).log_level, LevelFilter::OFF);
        assert_eq!(Config::from_parts(Args::default(), false, None, None).log_level, LevelFilter::OFF);
    }

    #[test]
    fn parses_command_flag() {
        let args = Args::from_args(&["wish"], &["-c", "echo hi | cat"]).unwrap();
        assert_eq!(args.command.as_deref(), Some("echo hi | cat"));
    }
}
