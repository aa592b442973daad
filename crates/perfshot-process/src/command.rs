//! Command-line description for external tools.

use perfshot_common::{ShotError, ShotResult};
use std::borrow::Cow;
use std::fmt;

/// A program plus its arguments, kept apart so nothing is ever re-parsed by
/// a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a single string with POSIX shell-word rules.
    ///
    /// ```rust
    /// use perfshot_process::CommandLine;
    ///
    /// let cmd = CommandLine::parse("./server --config 'my game.json'").unwrap();
    /// assert_eq!(cmd.program(), "./server");
    /// assert_eq!(cmd.arguments(), ["--config", "my game.json"]);
    /// ```
    pub fn parse(line: &str) -> ShotResult<Self> {
        let mut words = shlex::split(line)
            .ok_or_else(|| ShotError::configuration(format!("Unbalanced quoting in command: {line}")))?
            .into_iter();

        let program = words
            .next()
            .ok_or_else(|| ShotError::configuration("Command line cannot be empty"))?;

        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(&self.program).chain(self.args.iter());
        for (i, word) in words.enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            let quoted = shlex::try_quote(word).unwrap_or(Cow::Borrowed(word.as_str()));
            f.write_str(&quoted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_words() {
        let cmd = CommandLine::parse("perf record -o perf.data -g -p 42").unwrap();
        assert_eq!(cmd.program(), "perf");
        assert_eq!(cmd.arguments(), ["record", "-o", "perf.data", "-g", "-p", "42"]);
    }

    #[test]
    fn test_parse_rejects_empty_and_unbalanced() {
        assert!(matches!(
            CommandLine::parse("   "),
            Err(ShotError::Configuration { .. })
        ));
        assert!(matches!(
            CommandLine::parse("server 'unterminated"),
            Err(ShotError::Configuration { .. })
        ));
    }

    #[test]
    fn test_builder_and_display() {
        let cmd = CommandLine::new("perf").arg("script").args(["-i", "my trace.data"]);
        assert_eq!(cmd.arguments().len(), 3);
        let rendered = cmd.to_string();
        assert!(rendered.starts_with("perf script -i "), "{rendered}");

        let reparsed = CommandLine::parse(&cmd.to_string()).unwrap();
        assert_eq!(reparsed, cmd);
    }
}
