//! Scripted command executor used by unit tests

use crate::domain::ports::{CommandExecutor, CommandOptions, CommandOutput};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

enum Outcome {
    Output(String),
    Exit(i32, String),
}

/// Executor answering commands by prefix from queued outcomes
///
/// A command matches the first scripted prefix it starts with that still
/// has outcomes queued; unmatched commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Mutex<Vec<(String, VecDeque<Outcome>)>>,
    calls: Mutex<Vec<(String, CommandOptions)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, prefix: &str, outcome: Outcome) {
        let mut script = self.script.lock();
        match script.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, queue)) => queue.push_back(outcome),
            None => script.push((prefix.to_string(), VecDeque::from([outcome]))),
        }
    }

    /// Answer the next command starting with `prefix` with `stdout`
    pub fn output(&self, prefix: &str, stdout: &str) {
        self.push(prefix, Outcome::Output(stdout.to_string()));
    }

    /// Fail the next command starting with `prefix`
    pub fn exit(&self, prefix: &str, code: i32, stderr: &str) {
        self.push(prefix, Outcome::Exit(code, stderr.to_string()));
    }

    /// Commands run so far, space joined
    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn options(&self) -> Vec<CommandOptions> {
        self.calls.lock().iter().map(|(_, o)| *o).collect()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, command: &[String], options: CommandOptions) -> Result<CommandOutput> {
        let rendered = command.join(" ");
        self.calls.lock().push((rendered.clone(), options));

        let outcome = self
            .script
            .lock()
            .iter_mut()
            .find(|(prefix, queue)| rendered.starts_with(prefix.as_str()) && !queue.is_empty())
            .and_then(|(_, queue)| queue.pop_front());

        match outcome {
            Some(Outcome::Exit(code, stderr)) if options.check_exit_code => Err(Error::ProcessExecution {
                command: rendered,
                exit_code: Some(code),
                stdout: String::new(),
                stderr,
            }),
            Some(Outcome::Exit(_, stderr)) => Ok(CommandOutput {
                stdout: String::new(),
                stderr,
            }),
            Some(Outcome::Output(stdout)) => Ok(CommandOutput {
                stdout,
                stderr: String::new(),
            }),
            None => Ok(CommandOutput::default()),
        }
    }
}
