use std::process::{Command, Stdio};

use tracing::warn;

use crate::errors::{BenchError, Result};
use crate::types::NamedFunction;

/// An external command benchmarked by running it to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTarget {
    /// The command line as given, used as the benchmark name.
    pub line: String,
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTarget {
    /// Split `line` on whitespace into a program and its arguments. With
    /// `shell`, the whole line is handed to `sh -c` instead, so pipes and
    /// quoting work at the cost of one extra process per call.
    pub fn parse(line: &str, shell: bool) -> Result<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(BenchError::EmptyCommand);
        }

        if shell {
            return Ok(Self {
                line: trimmed.to_string(),
                program: "sh".to_string(),
                args: vec!["-c".to_string(), trimmed.to_string()],
            });
        }

        let mut words = trimmed.split_whitespace().map(String::from);
        let program = words.next().ok_or(BenchError::EmptyCommand)?;
        Ok(Self {
            line: trimmed.to_string(),
            program,
            args: words.collect(),
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// Run the command once so a missing program is reported before any
    /// timing starts. A non-zero exit status is only logged.
    pub fn probe(&self) -> Result<()> {
        let status = self
            .command()
            .status()
            .map_err(|source| BenchError::CommandSpawn {
                command: self.line.clone(),
                source,
            })?;
        if !status.success() {
            warn!(command = %self.line, %status, "command exited unsuccessfully");
        }
        Ok(())
    }

    /// Each call runs the command to completion with output discarded. A
    /// call that fails to start is logged and still timed.
    pub fn into_named_function(self) -> NamedFunction {
        let mut cmd = self.command();
        let line = self.line.clone();
        NamedFunction::new(self.line, move || {
            if let Err(err) = cmd.status() {
                warn!(command = %line, error = %err, "command failed to start");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_words() {
        let target = CommandTarget::parse("  sleep   0.01 ", false).unwrap();
        assert_eq!(target.line, "sleep   0.01");
        assert_eq!(target.program, "sleep");
        assert_eq!(target.args, vec!["0.01"]);
    }

    #[test]
    fn parse_program_only() {
        let target = CommandTarget::parse("true", false).unwrap();
        assert_eq!(target.program, "true");
        assert!(target.args.is_empty());
    }

    #[test]
    fn parse_shell_mode() {
        let target = CommandTarget::parse("echo hi | wc -c", true).unwrap();
        assert_eq!(target.program, "sh");
        assert_eq!(target.args, vec!["-c", "echo hi | wc -c"]);
        assert_eq!(target.line, "echo hi | wc -c");
    }

    #[test]
    fn parse_empty_rejected() {
        assert!(matches!(
            CommandTarget::parse("   ", false),
            Err(BenchError::EmptyCommand)
        ));
        assert!(matches!(
            CommandTarget::parse("", true),
            Err(BenchError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn probe_existing_command() {
        let target = CommandTarget::parse("true", false).unwrap();
        assert!(target.probe().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn probe_failing_command_is_not_fatal() {
        let target = CommandTarget::parse("false", false).unwrap();
        assert!(target.probe().is_ok());
    }

    #[test]
    fn probe_missing_program() {
        let target = CommandTarget::parse("quantbench-no-such-program-xyz", false).unwrap();
        let err = target.probe().unwrap_err();
        assert!(matches!(err, BenchError::CommandSpawn { .. }));
        assert!(err.to_string().contains("quantbench-no-such-program-xyz"));
    }

    #[test]
    fn named_function_survives_spawn_failure() {
        let mut function = CommandTarget::parse("quantbench-no-such-program-xyz --flag", false)
            .unwrap()
            .into_named_function();
        assert_eq!(function.name, "quantbench-no-such-program-xyz --flag");
        function.call();
        function.call();
    }

    #[cfg(unix)]
    #[test]
    fn named_function_keeps_command_line() {
        let mut function = CommandTarget::parse("true", false)
            .unwrap()
            .into_named_function();
        assert_eq!(function.name, "true");
        function.call();
    }
}
