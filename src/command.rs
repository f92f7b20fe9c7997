use std::path::PathBuf;

/// Program name followed by its arguments. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec { argv: Vec<String> }

impl CommandSpec {
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() { None } else { Some(CommandSpec { argv }) }
    }
    pub fn program(&self) -> &str { &self.argv[0] }
    /// Full argument vector, program name included.
    pub fn argv(&self) -> &[String] { &self.argv }
    /// Arguments after the program name.
    pub fn args(&self) -> &[String] { &self.argv[1..] }
}

/// `None` on either side means the stream stays on the terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectionSpec { pub input: Option<PathBuf>, pub output: Option<PathBuf> }

impl RedirectionSpec {
    pub fn is_empty(&self) -> bool { self.input.is_none() && self.output.is_none() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec { stages: Vec<CommandSpec> }

impl PipelineSpec {
    pub fn new(stages: Vec<CommandSpec>) -> Option<Self> {
        if stages.is_empty() { None } else { Some(PipelineSpec { stages }) }
    }
    pub fn stages(&self) -> &[CommandSpec] { &self.stages }
}

/// One input line after dispatch-level parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Single { command: CommandSpec, redirection: RedirectionSpec, background: bool },
    /// Always two or more stages.
    Pipeline(PipelineSpec),
}
