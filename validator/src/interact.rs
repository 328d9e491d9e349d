//! Prompt/response protocol for interactive staking CLI calls.
//!
//! Some staking commands ask for each BLS key's passphrase on the terminal.
//! Instead of matching output ad hoc, a call declares up front which prompts
//! it expects, in order, and what to answer; [`Exchange`] then walks that
//! script as a small state machine:
//!
//! ```text
//! AwaitingPrompt(0) -> .. -> AwaitingPrompt(n-1) -> AwaitingCompletion -> Complete
//! ```
//!
//! Each transition consumes one expected prompt marker from the output and
//! emits its response line. End of output finishes the exchange; anything
//! printed after the last prompt is the call's result.

use std::io::{ErrorKind, Read, Write};

use crate::error::InteractError;
use crate::keys::Passphrase;

/// Prompts the staking CLI is known to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    BlsPassphrase,
}

impl Prompt {
    pub const ALL: [Prompt; 1] = [Prompt::BlsPassphrase];

    pub fn marker(&self) -> &'static str {
        match self {
            Prompt::BlsPassphrase => "Enter the bls passphrase:",
        }
    }
}

/// Ordered prompts a call is expected to print, with their answers.
#[derive(Debug, Clone, Default)]
pub struct PromptScript {
    steps: Vec<(Prompt, Passphrase)>,
}

impl PromptScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(mut self, prompt: Prompt, answer: Passphrase) -> Self {
        self.steps.push((prompt, answer));
        self
    }

    /// The same prompt answered the same way `times` times in a row.
    pub fn repeated(prompt: Prompt, answer: &Passphrase, times: usize) -> Self {
        Self {
            steps: vec![(prompt, answer.clone()); times],
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Waiting for the prompt of step `n`.
    AwaitingPrompt(usize),
    /// Every prompt answered; waiting for end of output.
    AwaitingCompletion,
    Complete,
}

pub struct Exchange<'a> {
    script: &'a PromptScript,
    state: ExchangeState,
    pending: String,
}

impl<'a> Exchange<'a> {
    pub fn new(script: &'a PromptScript) -> Self {
        let state = if script.is_empty() {
            ExchangeState::AwaitingCompletion
        } else {
            ExchangeState::AwaitingPrompt(0)
        };
        Self {
            script,
            state,
            pending: String::new(),
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Consume a chunk of terminal output and return the lines to send back,
    /// in order.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<&'a str>, InteractError> {
        let script: &'a PromptScript = self.script;
        self.pending.push_str(chunk);
        let mut replies = Vec::new();
        loop {
            match self.state {
                ExchangeState::AwaitingPrompt(step) => {
                    let (prompt, answer) = &script.steps[step];
                    let marker = prompt.marker();
                    let Some(at) = self.pending.find(marker) else {
                        break;
                    };
                    self.pending.drain(..at + marker.len());
                    replies.push(answer.expose());
                    self.state = if step + 1 < script.len() {
                        ExchangeState::AwaitingPrompt(step + 1)
                    } else {
                        ExchangeState::AwaitingCompletion
                    };
                }
                ExchangeState::AwaitingCompletion => {
                    if let Some(prompt) = Prompt::ALL
                        .into_iter()
                        .find(|p| self.pending.contains(p.marker()))
                    {
                        return Err(InteractError::UnexpectedPrompt {
                            prompt,
                            output: std::mem::take(&mut self.pending),
                        });
                    }
                    break;
                }
                ExchangeState::Complete => break,
            }
        }
        Ok(replies)
    }

    /// End of output. Returns what was printed after the last prompt.
    pub fn finish(&mut self) -> Result<String, InteractError> {
        match self.state {
            ExchangeState::AwaitingPrompt(step) => Err(InteractError::UnexpectedEof {
                expected: self.script.steps[step].0,
                answered: step,
                output: std::mem::take(&mut self.pending),
            }),
            ExchangeState::AwaitingCompletion | ExchangeState::Complete => {
                self.state = ExchangeState::Complete;
                Ok(std::mem::take(&mut self.pending).trim().to_string())
            }
        }
    }
}

/// Drive `script` over a terminal until its output ends.
pub fn run_exchange<R: Read, W: Write>(
    script: &PromptScript,
    mut output: R,
    mut input: W,
) -> Result<String, InteractError> {
    let mut exchange = Exchange::new(script);
    let mut buf = [0u8; 4096];
    loop {
        let read = match output.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            // A pty master reports EIO once the child side is closed.
            Err(e) if e.raw_os_error() == Some(EIO) => break,
            Err(e) => return Err(e.into()),
        };
        for reply in exchange.feed(&String::from_utf8_lossy(&buf[..read]))? {
            input.write_all(reply.as_bytes())?;
            input.write_all(b"\n")?;
            input.flush()?;
        }
    }
    exchange.finish()
}

const EIO: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pass(s: &str) -> Passphrase {
        Passphrase::new(s)
    }

    #[test]
    fn answers_each_prompt_in_order_and_returns_trailing_output() {
        let script = PromptScript::new()
            .expect(Prompt::BlsPassphrase, pass("first"))
            .expect(Prompt::BlsPassphrase, pass("second"));
        let output = "Enter the bls passphrase:\r\nEnter the bls passphrase:\r\n{\"transaction-hash\": \"0x1\"}\r\n";
        let mut input = Vec::new();

        let result = run_exchange(&script, Cursor::new(output), &mut input).unwrap();

        assert_eq!(String::from_utf8(input).unwrap(), "first\nsecond\n");
        assert_eq!(result, "{\"transaction-hash\": \"0x1\"}");
    }

    #[test]
    fn prompt_split_across_chunks_is_recognised() {
        let script = PromptScript::new().expect(Prompt::BlsPassphrase, pass("pw"));
        let mut exchange = Exchange::new(&script);

        assert!(exchange.feed("Enter the bls ").unwrap().is_empty());
        assert_eq!(exchange.state(), ExchangeState::AwaitingPrompt(0));
        assert_eq!(exchange.feed("passphrase:\r\n").unwrap(), vec!["pw"]);
        assert_eq!(exchange.state(), ExchangeState::AwaitingCompletion);
        exchange.feed("done").unwrap();
        assert_eq!(exchange.finish().unwrap(), "done");
        assert_eq!(exchange.state(), ExchangeState::Complete);
    }

    #[test]
    fn early_end_of_output_reports_missing_prompt() {
        let script = PromptScript::repeated(Prompt::BlsPassphrase, &pass("pw"), 2);
        let output = "Enter the bls passphrase:\r\nerror: insufficient balance\r\n";

        let err = run_exchange(&script, Cursor::new(output), Vec::new()).unwrap_err();

        match err {
            InteractError::UnexpectedEof { expected, answered, output } => {
                assert_eq!(expected, Prompt::BlsPassphrase);
                assert_eq!(answered, 1);
                assert!(output.contains("insufficient balance"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn extra_prompt_is_rejected() {
        let script = PromptScript::new().expect(Prompt::BlsPassphrase, pass("pw"));
        let output = "Enter the bls passphrase:\r\nEnter the bls passphrase:\r\n";

        let err = run_exchange(&script, Cursor::new(output), Vec::new()).unwrap_err();
        assert!(matches!(err, InteractError::UnexpectedPrompt { .. }));
    }

    #[test]
    fn empty_script_just_collects_output() {
        let script = PromptScript::new();
        let result = run_exchange(&script, Cursor::new("  ok \n"), Vec::new()).unwrap();
        assert_eq!(result, "ok");
    }
}
