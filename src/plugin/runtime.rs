use std::fmt;

use crate::error::{CypherpunkError, Result};
use crate::plugin::manifest::{AppDefinition, AppId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleAction {
    Install,
    Uninstall,
    Start,
    Stop,
}

impl LifecycleAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "install" => Some(LifecycleAction::Install),
            "uninstall" | "remove" => Some(LifecycleAction::Uninstall),
            "start" => Some(LifecycleAction::Start),
            "stop" => Some(LifecycleAction::Stop),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LifecycleAction::Install => "install",
            LifecycleAction::Uninstall => "uninstall",
            LifecycleAction::Start => "start",
            LifecycleAction::Stop => "stop",
        }
    }

    /// Flip the record's flags. Label changes only; nothing is spawned.
    pub fn apply(&self, app: &mut AppDefinition) -> Result<()> {
        match self {
            LifecycleAction::Install => {
                app.installed = true;
            }
            LifecycleAction::Uninstall => {
                if app.is_core {
                    return Err(CypherpunkError::conflict(format!(
                        "{} is a core component and cannot be uninstalled",
                        app.name
                    )));
                }
                app.installed = false;
                app.running = false;
            }
            LifecycleAction::Start => {
                app.installed = true;
                app.running = true;
                app.has_error = false;
            }
            LifecycleAction::Stop => {
                app.running = false;
            }
        }
        Ok(())
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Succeeded,
    Failed(String),
}

/// One requested lifecycle change and how it ended.
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: u64,
    pub target: AppId,
    pub action: LifecycleAction,
    pub state: OperationState,
}

impl Operation {
    pub fn pending(id: u64, target: AppId, action: LifecycleAction) -> Self {
        Self {
            id,
            target,
            action,
            state: OperationState::Pending,
        }
    }

    /// Run the action against `app` and settle the operation.
    pub fn run(&mut self, app: &mut AppDefinition) -> Result<()> {
        let outcome = self.action.apply(app);
        self.settle(&outcome);
        outcome
    }

    /// Record how the work behind this operation ended, wherever it ran.
    pub fn settle<T>(&mut self, outcome: &Result<T>) {
        self.state = match outcome {
            Ok(_) => OperationState::Succeeded,
            Err(err) => OperationState::Failed(err.to_string()),
        };
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            OperationState::Pending => "pending".to_string(),
            OperationState::Succeeded => "ok".to_string(),
            OperationState::Failed(reason) => format!("failed: {reason}"),
        };
        write!(f, "#{} {} {} [{state}]", self.id, self.action, self.target)
    }
}
