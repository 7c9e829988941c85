//! Admission control and the timeout watchdog

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::spawn::{self, Completion};
use super::{RunSummary, SyncTask, TaskOutcome, TerminalState};
use crate::PoolConfig;

/// Runs batches of tasks with at most `throttle` processes alive at once
#[derive(Debug, Clone)]
pub struct ThrottlePool {
    throttle: usize,
    timeout: Duration,
    report_interval: Duration,
    cancel: CancellationToken,
}

impl ThrottlePool {
    /// Create a pool from configuration
    ///
    /// A throttle of 0 is treated as 1.
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            throttle: config.throttle.max(1),
            timeout: config.timeout,
            report_interval: config.report_interval.max(Duration::from_millis(1)),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` as an abort signal; cancelling it acts like an immediate timeout
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run every task to a terminal state
    ///
    /// Tasks are admitted in order. Once the timeout measured from the start
    /// of this call has elapsed, running processes are killed and tasks not
    /// yet admitted end up `Cancelled`. Returns only when no process is left.
    pub async fn run(&self, tasks: Vec<SyncTask>) -> RunSummary {
        let mut run = Run::new(self, &tasks);

        for (index, task) in tasks.iter().enumerate() {
            while !run.escalated && run.running.len() >= self.throttle {
                run.step().await;
            }

            run.check_deadline();
            if run.escalated {
                continue;
            }

            run.launch(index, task);
        }

        while !run.running.is_empty() {
            run.step().await;
        }

        run.finish()
    }
}

/// A process the controller still considers running
struct Tracked {
    name: String,
    kill: Option<oneshot::Sender<()>>,
}

enum Event {
    Finished(Completion),
    Report,
    Deadline,
    Cancelled,
}

/// State of one `run` call, owned by the controlling task alone
struct Run<'a> {
    pool: &'a ThrottlePool,
    start: Instant,
    deadline: Instant,
    next_report: Instant,
    escalated: bool,
    reports: usize,
    running: BTreeMap<usize, Tracked>,
    // Every slot starts as Cancelled and is overwritten once the task
    // reaches another terminal state.
    outcomes: Vec<TaskOutcome>,
    events_tx: mpsc::UnboundedSender<Completion>,
    events_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<'a> Run<'a> {
    fn new(pool: &'a ThrottlePool, tasks: &[SyncTask]) -> Self {
        let start = Instant::now();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            pool,
            start,
            deadline: start + pool.timeout,
            next_report: start + pool.report_interval,
            escalated: false,
            reports: 0,
            running: BTreeMap::new(),
            outcomes: tasks
                .iter()
                .map(|task| TaskOutcome {
                    name: task.name.clone(),
                    state: TerminalState::Cancelled,
                    launched_at: None,
                    finished_at: None,
                })
                .collect(),
            events_tx,
            events_rx,
        }
    }

    fn launch(&mut self, index: usize, task: &SyncTask) {
        match spawn::launch(index, task, self.events_tx.clone()) {
            Ok(kill) => {
                info!(task = %task.name, "{}", task.description);
                self.outcomes[index].launched_at = Some(self.start.elapsed());
                self.running.insert(
                    index,
                    Tracked {
                        name: task.name.clone(),
                        kill: Some(kill),
                    },
                );
            }
            Err(e) => {
                error!(task = %task.name, "Failed to launch '{}': {}", task.program, e);
                self.outcomes[index].state = TerminalState::FailedToLaunch {
                    reason: e.to_string(),
                };
            }
        }
    }

    /// Wait for the next thing that needs the controller's attention
    async fn step(&mut self) {
        let event = tokio::select! {
            Some(done) = self.events_rx.recv() => Event::Finished(done),
            _ = sleep_until(self.next_report), if !self.escalated => Event::Report,
            _ = sleep_until(self.deadline), if !self.escalated => Event::Deadline,
            _ = self.pool.cancel.cancelled(), if !self.escalated => Event::Cancelled,
        };

        match event {
            Event::Finished(done) => self.finished(done),
            Event::Report => {
                if Instant::now() >= self.deadline {
                    self.escalate();
                } else {
                    self.report();
                    self.next_report += self.pool.report_interval;
                }
            }
            Event::Deadline => self.escalate(),
            Event::Cancelled => {
                warn!("Cancellation requested");
                self.escalate();
            }
        }
    }

    fn finished(&mut self, done: Completion) {
        let Some(tracked) = self.running.remove(&done.index) else {
            return;
        };

        debug!(task = %tracked.name, state = %done.state, "Finished");
        let outcome = &mut self.outcomes[done.index];
        outcome.state = done.state;
        outcome.finished_at = Some(done.at.saturating_duration_since(self.start));
    }

    fn report(&mut self) {
        if self.running.is_empty() {
            return;
        }
        self.reports += 1;

        let names: Vec<&str> = self.running.values().map(|t| t.name.as_str()).collect();
        info!(count = names.len(), "Still running: {}", names.join(", "));
    }

    /// Escalate if the deadline passed or cancellation arrived between events
    fn check_deadline(&mut self) {
        if !self.escalated
            && (Instant::now() >= self.deadline || self.pool.cancel.is_cancelled())
        {
            self.escalate();
        }
    }

    fn escalate(&mut self) {
        self.escalated = true;

        for tracked in self.running.values_mut() {
            warn!(task = %tracked.name, "Killing: '{}'", tracked.name);
            if let Some(kill) = tracked.kill.take() {
                let _ = kill.send(());
            }
        }
    }

    fn finish(self) -> RunSummary {
        RunSummary {
            outcomes: self.outcomes,
            elapsed: self.start.elapsed(),
            reports: self.reports,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pool(throttle: usize, timeout: Duration) -> ThrottlePool {
        ThrottlePool::new(&PoolConfig {
            throttle,
            timeout,
            ..PoolConfig::default()
        })
    }

    fn shell(name: &str, script: &str) -> SyncTask {
        SyncTask::new(name, "sh").args(["-c", script])
    }

    fn reporting_pool(timeout: Duration, report_interval: Duration) -> ThrottlePool {
        ThrottlePool::new(&PoolConfig {
            throttle: 2,
            timeout,
            report_interval,
            ..PoolConfig::default()
        })
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let summary = pool(2, Duration::from_secs(5)).run(Vec::new()).await;
        assert!(summary.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_all_tasks_exit() {
        let tasks = (0..4).map(|i| shell(&format!("t{}", i), "exit 0")).collect();
        let summary = pool(2, Duration::from_secs(30)).run(tasks).await;

        assert_eq!(summary.exited(), 4);
        for outcome in &summary.outcomes {
            assert_eq!(outcome.state, TerminalState::Exited { code: Some(0) });
            assert!(outcome.launched_at.is_some());
            assert!(outcome.finished_at.is_some());
        }
    }

    #[tokio::test]
    async fn test_exit_code_recorded() {
        let summary = pool(1, Duration::from_secs(30))
            .run(vec![shell("failing", "exit 3")])
            .await;
        assert_eq!(
            summary.outcomes[0].state,
            TerminalState::Exited { code: Some(3) }
        );
    }

    #[tokio::test]
    async fn test_failed_launch_does_not_hold_slot() {
        let tasks = vec![
            SyncTask::new("missing", "/nonexistent/superpull-test-binary"),
            shell("ok", "exit 0"),
        ];
        let summary = pool(1, Duration::from_secs(30)).run(tasks).await;

        assert!(matches!(
            summary.outcomes[0].state,
            TerminalState::FailedToLaunch { .. }
        ));
        assert!(summary.outcomes[0].launched_at.is_none());
        assert!(summary.outcomes[1].state.is_success());
    }

    #[tokio::test]
    async fn test_throttle_one_is_sequential() {
        let tasks = vec![shell("first", "sleep 0.3"), shell("second", "sleep 0.1")];
        let summary = pool(1, Duration::from_secs(30)).run(tasks).await;

        let first_done = summary.outcomes[0].finished_at.unwrap();
        let second_start = summary.outcomes[1].launched_at.unwrap();
        assert!(second_start >= first_done);
    }

    #[tokio::test]
    async fn test_never_more_than_throttle_running() {
        let dir = TempDir::new().unwrap();
        let live = dir.path().join("live");
        std::fs::create_dir(&live).unwrap();
        let counts = dir.path().join("counts");

        let tasks = (0..8)
            .map(|i| {
                let script = format!(
                    "touch {live}/{i}; ls {live} | wc -l >> {counts}; sleep 0.{d}; rm {live}/{i}",
                    live = live.display(),
                    counts = counts.display(),
                    i = i,
                    d = 1 + i % 3,
                );
                shell(&format!("t{}", i), &script)
            })
            .collect();

        let summary = pool(3, Duration::from_secs(30)).run(tasks).await;
        assert_eq!(summary.exited(), 8);

        // Markers seen by each process never exceed the throttle
        let observed = std::fs::read_to_string(&counts).unwrap();
        let max = observed
            .lines()
            .map(|l| l.trim().parse::<usize>().unwrap())
            .max()
            .unwrap();
        assert!(max <= 3, "saw {} concurrent processes", max);

        // And the recorded lifetimes agree
        let mut edges: Vec<(Duration, i32)> = Vec::new();
        for outcome in &summary.outcomes {
            edges.push((outcome.launched_at.unwrap(), 1));
            edges.push((outcome.finished_at.unwrap(), -1));
        }
        // Exits sort before launches at the same instant
        edges.sort();
        let mut live_now = 0;
        for (_, delta) in edges {
            live_now += delta;
            assert!(live_now <= 3);
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_running() {
        let started = std::time::Instant::now();
        let summary = pool(2, Duration::from_secs(1))
            .run(vec![shell("hung", "sleep 30"), shell("quick", "exit 0")])
            .await;

        assert_eq!(summary.outcomes[0].state, TerminalState::Killed);
        assert!(summary.outcomes[1].state.is_success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_kills_whole_tree() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("survived");
        let script = format!("(sleep 2; touch {}) & wait", marker.display());

        let summary = pool(1, Duration::from_millis(500))
            .run(vec![shell("tree", &script)])
            .await;
        assert_eq!(summary.outcomes[0].state, TerminalState::Killed);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!marker.exists(), "grandchild outlived the kill");
    }

    #[tokio::test]
    async fn test_background_children_killed_after_exit() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("orphan");
        let script = format!("(sleep 1; touch {}) & exit 0", marker.display());

        let summary = pool(1, Duration::from_secs(30))
            .run(vec![shell("leader", &script)])
            .await;
        assert_eq!(
            summary.outcomes[0].state,
            TerminalState::Exited { code: Some(0) }
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "background child outlived its task");
    }

    #[tokio::test]
    async fn test_reports_every_interval_until_done() {
        let summary = reporting_pool(Duration::from_secs(30), Duration::from_millis(100))
            .run(vec![shell("slow", "sleep 0.45")])
            .await;

        assert!(summary.outcomes[0].state.is_success());
        // 100ms, 200ms and 300ms at least; never more than the elapsed time allows
        let ceiling = (summary.elapsed.as_millis() / 100) as usize;
        assert!(summary.reports >= 3, "only {} reports", summary.reports);
        assert!(summary.reports <= ceiling, "{} reports in {:?}", summary.reports, summary.elapsed);
    }

    #[tokio::test]
    async fn test_no_report_after_deadline() {
        let summary = reporting_pool(Duration::from_millis(250), Duration::from_millis(100))
            .run(vec![shell("hung", "sleep 30")])
            .await;

        assert_eq!(summary.outcomes[0].state, TerminalState::Killed);
        // 100ms and 200ms fall before the deadline, 300ms does not
        assert!(summary.reports <= 2, "{} reports", summary.reports);
    }

    #[tokio::test]
    async fn test_no_report_when_done_early() {
        let summary = reporting_pool(Duration::from_secs(30), Duration::from_secs(10))
            .run(vec![shell("quick", "exit 0")])
            .await;
        assert_eq!(summary.reports, 0);
    }

    #[tokio::test]
    async fn test_queued_tasks_cancelled_after_deadline() {
        let tasks = vec![shell("hung", "sleep 30"), shell("never", "exit 0")];
        let summary = pool(1, Duration::from_millis(500)).run(tasks).await;

        assert_eq!(summary.outcomes[0].state, TerminalState::Killed);
        assert_eq!(summary.outcomes[1].state, TerminalState::Cancelled);
        assert!(summary.outcomes[1].launched_at.is_none());
    }

    #[tokio::test]
    async fn test_cancellation_acts_like_timeout() {
        let token = CancellationToken::new();
        let pool = pool(2, Duration::from_secs(60)).with_cancellation(token.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let summary = pool.run(vec![shell("hung", "sleep 30")]).await;
        assert_eq!(summary.outcomes[0].state, TerminalState::Killed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_workdir_is_used() {
        let dir = TempDir::new().unwrap();
        let task = shell("pwd", "touch here").current_dir(dir.path());

        let summary = pool(1, Duration::from_secs(30)).run(vec![task]).await;
        assert!(summary.outcomes[0].state.is_success());
        assert!(dir.path().join("here").exists());
    }
}
