use std::fmt;

/// External command-line tools runway drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Aws,
    Docker,
}

impl Tool {
    pub fn program(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Docker => "docker",
        }
    }

    fn install_hint(self) -> &'static str {
        match self {
            Self::Aws => "https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html",
            Self::Docker => "https://docs.docker.com/get-docker/",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{tool} CLI not found — install: {hint}", hint = .tool.install_hint())]
    NotFound { tool: Tool, source: std::io::Error },

    #[error("{tool} command failed: {args:?}\n{stderr}")]
    CommandFailed {
        tool: Tool,
        args: Vec<String>,
        stderr: String,
    },

    #[error("{tool} output was not valid UTF-8")]
    InvalidUtf8 {
        tool: Tool,
        source: std::string::FromUtf8Error,
    },

    #[error("failed to write to {tool} stdin")]
    StdinWrite { tool: Tool, source: std::io::Error },
}

impl CommandError {
    /// Captured stderr of a command that ran and exited non-zero.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Whether the command ran and its stderr contains `needle`.
    pub fn stderr_contains(&self, needle: &str) -> bool {
        self.stderr().is_some_and(|s| s.contains(needle))
    }
}
