//! Launching pool tasks and waiting on them
//!
//! Every child is owned by a small waiter task that reports exactly one
//! completion. Kill requests reach the child through that waiter, so a pid is
//! only signalled while it has not been reaped. Its process group is killed
//! as soon as the leader is gone, so nothing it started outlives the task.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::debug;

use super::{SyncTask, TerminalState};

/// Message sent by a waiter when its process reaches a terminal state
#[derive(Debug)]
pub(super) struct Completion {
    pub index: usize,
    pub state: TerminalState,
    pub at: Instant,
}

/// Start the process for `task` and hand it to a waiter
///
/// Returns the channel used to request a kill of the whole process tree.
pub(super) fn launch(
    index: usize,
    task: &SyncTask,
    events: mpsc::UnboundedSender<Completion>,
) -> std::io::Result<oneshot::Sender<()>> {
    let mut command = Command::new(&task.program);
    command
        .args(&task.args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    if let Some(ref dir) = task.workdir {
        command.current_dir(dir);
    }

    // Own process group, so the group id equals the child's pid.
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn()?;
    let pid = child.id();
    debug!(task = %task.name, pid = ?pid, "Launched");

    let (kill_tx, kill_rx) = oneshot::channel();
    tokio::spawn(wait_for_exit(index, child, pid, kill_rx, events));

    Ok(kill_tx)
}

async fn wait_for_exit(
    index: usize,
    mut child: Child,
    pid: Option<u32>,
    mut kill: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<Completion>,
) {
    let state = tokio::select! {
        status = child.wait() => {
            // Whatever the leader left running in its group goes with it
            kill_group(pid);
            match status {
                Ok(status) => TerminalState::Exited { code: status.code() },
                Err(e) => {
                    tracing::warn!(pid = ?pid, "Failed to wait for process: {}", e);
                    TerminalState::Exited { code: None }
                }
            }
        },
        Ok(()) = &mut kill => {
            kill_tree(&mut child, pid).await;
            TerminalState::Killed
        }
    };

    let _ = events.send(Completion {
        index,
        state,
        at: Instant::now(),
    });
}

/// Kill the child and every process in its group, then reap it
async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);

    if let Err(e) = child.kill().await {
        debug!(pid = ?pid, "kill failed: {}", e);
    }
}

/// SIGKILL the process group led by `pid`
///
/// The group id stays reserved while any member is alive, so this never hits
/// an unrelated group. An already empty group (ESRCH) is not an error.
fn kill_group(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        // Safe cast: pids fit in i32 on every unix we run on
        #[allow(clippy::cast_possible_wrap)]
        let group = Pid::from_raw(pid as i32);
        match killpg(group, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => debug!(pid, "killpg failed: {}", e),
        }
    }

    #[cfg(not(unix))]
    let _ = pid;
}
