use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a redirection target could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure { FileNotFound, PermissionDenied, Other }

impl OpenFailure {
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => OpenFailure::FileNotFound,
            io::ErrorKind::PermissionDenied => OpenFailure::PermissionDenied,
            _ => OpenFailure::Other,
        }
    }
}

impl fmt::Display for OpenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { OpenFailure::FileNotFound => "no such file", OpenFailure::PermissionDenied => "permission denied", OpenFailure::Other => "cannot open" })
    }
}

/// Malformed command lines. All of these are detected before any process exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("missing file name after '{0}'")]
    MissingTarget(&'static str),
    #[error("expected '>' but found '{found}'")]
    ExpectedOutput { found: String },
    #[error("unexpected '{0}' after redirection")]
    UnexpectedToken(String),
    #[error("'{0}' given more than once")]
    DuplicateRedirect(&'static str),
    #[error("'&' must be the last token")]
    MisplacedBackground,
    #[error("missing command")]
    MissingCommand,
    #[error("empty command in pipeline")]
    EmptyStage,
    #[error("redirection cannot be combined with '|'")]
    PipelineRedirect,
    #[error("pipelines cannot run in the background")]
    PipelineBackground,
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("could not create child process: {0}")]
    Fork(#[source] nix::Error),
    #[error("could not create pipe: {0}")]
    Pipe(#[source] nix::Error),
    #[error("{}: {reason}", .path.display())]
    Redirect { path: PathBuf, reason: OpenFailure, #[source] source: io::Error },
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("argument contains a NUL byte")]
    NulByte(#[from] std::ffi::NulError),
    #[error("shell is not the terminal's foreground process group")]
    NotForeground,
    #[error("shell could not become its own process group leader")]
    NotGroupLeader,
    #[error("terminal control failed: {0}")]
    Terminal(#[source] nix::Error),
    #[error("signal setup failed: {0}")]
    Signal(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Os(#[from] nix::Error),
}

impl ShellError {
    pub fn redirect(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ShellError::Redirect { path: path.into(), reason: OpenFailure::classify(&source), source }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
