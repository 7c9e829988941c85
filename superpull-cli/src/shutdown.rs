use superpull_core::CancellationToken;

/// Cancel `token` on the first Ctrl+C and exit on the second
///
/// Cancelling the token makes the running pool kill its processes and
/// return, so the command still prints its summary.
pub(crate) fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }

        tracing::warn!("Shutdown requested, killing running git processes");
        eprintln!("Press Ctrl+C again to force quit.");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }

        eprintln!("Force quit!");
        std::process::exit(130);
    });
}
