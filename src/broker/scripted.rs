//! In-memory executor used by tests instead of spawning broker tools.

use super::executor::{CommandExecutor, CommandOutput, CommandSpec};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

struct Script {
    needle: String,
    responses: VecDeque<CommandOutput>,
}

/// Answers commands whose rendered line contains a registered needle. Queued
/// responses are consumed in order and the last one repeats.
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<Vec<Script>>,
    calls: Mutex<Vec<CommandSpec>>,
    delay: Option<Duration>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn respond(&self, needle: &str, output: CommandOutput) -> &Self {
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(script) = scripts.iter_mut().find(|s| s.needle == needle) {
            script.responses.push_back(output);
        } else {
            scripts.push(Script {
                needle: needle.to_string(),
                responses: VecDeque::from([output]),
            });
        }
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.to_string().contains(needle))
            .count()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, command: &CommandSpec) -> CommandOutput {
        self.calls.lock().unwrap().push(command.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let line = command.to_string();
        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.iter_mut().find(|s| line.contains(&s.needle)) else {
            return CommandOutput::failed(format!("no scripted response for `{line}`"));
        };

        if script.responses.len() > 1 {
            script.responses.pop_front().unwrap_or_default()
        } else {
            script.responses.front().cloned().unwrap_or_default()
        }
    }
}
