//! Start/stop/reset control signals from the UI glue.

use std::str::FromStr;

use anyhow::{anyhow, Error};

use crate::pipeline::{DetectionLoop, LoopState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    /// Start when Idle, stop when Running (the toggle button).
    Toggle,
    Reset,
    Quit,
}

impl FromStr for ControlCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ControlCommand::Start),
            "stop" => Ok(ControlCommand::Stop),
            "toggle" | "t" | "" => Ok(ControlCommand::Toggle),
            "reset" => Ok(ControlCommand::Reset),
            "quit" | "q" | "exit" => Ok(ControlCommand::Quit),
            other => Err(anyhow!(
                "unknown command '{}' (expected start, stop, toggle, reset or quit)",
                other
            )),
        }
    }
}

impl ControlCommand {
    /// Apply the command to the loop and return the resulting state.
    ///
    /// `Quit` only stops detection; shutting down is up to the caller.
    pub fn apply(self, detection: &DetectionLoop) -> LoopState {
        match self {
            ControlCommand::Start => {
                detection.start();
            }
            ControlCommand::Stop | ControlCommand::Quit => {
                detection.stop();
            }
            ControlCommand::Toggle => match detection.state() {
                LoopState::Idle => {
                    detection.start();
                }
                LoopState::Running => {
                    detection.stop();
                }
            },
            ControlCommand::Reset => detection.reset(),
        }
        detection.state()
    }
}
