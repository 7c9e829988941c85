//! Task and outcome types for the throttle pool

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One external command to run, usually one per repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTask {
    /// Identifier shown in progress reports (folder name)
    pub name: String,
    /// Executable to launch
    pub program: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Working directory for the process, if not inherited
    pub workdir: Option<PathBuf>,
    /// Line logged when the process is launched
    pub description: String,
}

impl SyncTask {
    /// Create a task with no arguments
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("Starting {}", name),
            name,
            program: program.into(),
            args: Vec::new(),
            workdir: None,
        }
    }

    /// Replace the line logged at launch
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the process inside `dir`
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

/// How a task left the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    /// The process exited on its own; the code is recorded, not interpreted
    Exited { code: Option<i32> },
    /// The process tree was killed by the watchdog or by cancellation
    Killed,
    /// The process could not be created; the task never held a slot
    FailedToLaunch { reason: String },
    /// The deadline passed before the task was admitted
    Cancelled,
}

impl TerminalState {
    /// Whether the process exited with status 0
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited { code: Some(0) })
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited { code: Some(code) } => write!(f, "exited ({})", code),
            Self::Exited { code: None } => write!(f, "exited (signal)"),
            Self::Killed => write!(f, "killed"),
            Self::FailedToLaunch { reason } => write!(f, "failed to launch: {}", reason),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final record of one task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Task identifier
    pub name: String,
    /// Terminal state reached
    pub state: TerminalState,
    /// Offset from pool start at which the process was created
    pub launched_at: Option<Duration>,
    /// Offset from pool start at which the process was observed finished
    pub finished_at: Option<Duration>,
}

/// Outcomes of one pool run, in submission order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TaskOutcome>,
    pub elapsed: Duration,
    /// "Still running" reports emitted before the deadline
    pub reports: usize,
}

impl RunSummary {
    fn count(&self, pred: impl Fn(&TerminalState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.state)).count()
    }

    pub fn exited(&self) -> usize {
        self.count(|s| matches!(s, TerminalState::Exited { .. }))
    }

    pub fn killed(&self) -> usize {
        self.count(|s| matches!(s, TerminalState::Killed))
    }

    pub fn failed_to_launch(&self) -> usize {
        self.count(|s| matches!(s, TerminalState::FailedToLaunch { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, TerminalState::Cancelled))
    }
}
