use std::io::{self, BufRead, Write};

use eyre::{bail, WrapErr as _};

/// Operator interaction needed before registration can go on.
pub trait TermsPrompt {
    /// Shows the terms of service at `uri` and blocks until the operator agrees.
    ///
    /// Returns an error if the operator declines.
    fn accept_terms(&mut self, uri: &str) -> eyre::Result<()>;
}

/// Asks on a terminal-like reader/writer pair, stdin/stdout by default.
#[derive(Debug)]
pub struct StdinPrompt<R = io::StdinLock<'static>, W = io::Stdout> {
    input: R,
    output: W,
}

impl StdinPrompt {
    pub fn new() -> Self {
        StdinPrompt {
            input: io::stdin().lock(),
            output: io::stdout(),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead, W: Write> StdinPrompt<R, W> {
    pub fn with_io(input: R, output: W) -> Self {
        StdinPrompt { input, output }
    }
}

impl<R: BufRead, W: Write> TermsPrompt for StdinPrompt<R, W> {
    fn accept_terms(&mut self, uri: &str) -> eyre::Result<()> {
        writeln!(
            self.output,
            "\nThe localcert authority requires you to accept its terms of service:\n\n  {uri}\n"
        )?;
        write!(self.output, "Do you accept these terms? [y/N] ")?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input
            .read_line(&mut answer)
            .context("reading answer")?;

        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Ok(()),
            _ => bail!("declined terms of service {uri}"),
        }
    }
}
