pub mod executor;
pub mod parsers;
pub mod probe;

pub use probe::JcmdProbe;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JcmdError {
    #[error("{0} not found in JAVA_HOME or PATH")]
    ToolNotFound(String),

    #[error("Failed to execute {command}: {source}")]
    ExecutionFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command timed out: {command}")]
    Timeout { command: String },

    #[error("{command} exited with {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Resolves a JDK tool, preferring `$JAVA_HOME/bin` over `PATH`.
pub fn locate_tool(name: &str) -> PathBuf {
    let java_home = std::env::var_os("JAVA_HOME").map(PathBuf::from);
    locate_tool_in(name, java_home.as_deref())
}

fn locate_tool_in(name: &str, java_home: Option<&std::path::Path>) -> PathBuf {
    if let Some(home) = java_home {
        let mut path = home.join("bin").join(name);
        if cfg!(target_os = "windows") {
            path.set_extension("exe");
        }
        if path.is_file() {
            return path;
        }
    }
    PathBuf::from(name)
}
