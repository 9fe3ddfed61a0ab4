//! Spawning and reaping of Player and View child processes.

use std::process::Stdio;

use tokio::process::{Child, ChildStdout, Command};

/// A Player child process plus its dedicated stdout pipe.
pub struct PlayerHandle {
    pub index: usize,
    pub child: Child,
    /// `None` once the pipe has been observed closed or read-erroring.
    pub stdout: Option<ChildStdout>,
}

/// The View child process, if one was configured.
pub struct ViewHandle {
    pub child: Child,
}

/// Spawns one Player process per path, with its standard output piped back
/// to Master and `W H` as arguments. Returns the handles in player-index
/// order; the caller still owns recording each PID into the shared state.
pub fn spawn_players(paths: &[String], width: u16, height: u16) -> std::io::Result<Vec<PlayerHandle>> {
    let mut handles = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        let mut child = Command::new(path)
            .arg(width.to_string())
            .arg(height.to_string())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdout = child.stdout.take();
        tracing::info!(index, path, pid = child.id(), "spawned player");
        handles.push(PlayerHandle { index, child, stdout });
    }
    Ok(handles)
}

/// Spawns the View process, if configured.
pub fn spawn_view(path: &Option<String>, width: u16, height: u16) -> std::io::Result<Option<ViewHandle>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let child = Command::new(path)
        .arg(width.to_string())
        .arg(height.to_string())
        .spawn()?;
    tracing::info!(path, pid = child.id(), "spawned view");
    Ok(Some(ViewHandle { child }))
}

/// Waits for every player, then the view if present, logging each exit
/// status. Best-effort: a child that cannot be waited on is logged and
/// skipped rather than treated as fatal, since Master is already shutting down.
pub async fn reap_all(players: &mut [PlayerHandle], view: &mut Option<ViewHandle>) {
    for handle in players.iter_mut() {
        match handle.child.wait().await {
            Ok(status) => tracing::info!(index = handle.index, ?status, "player exited"),
            Err(err) => tracing::warn!(index = handle.index, ?err, "failed to reap player"),
        }
    }
    if let Some(view) = view.as_mut() {
        match view.child.wait().await {
            Ok(status) => tracing::info!(?status, "view exited"),
            Err(err) => tracing::warn!(?err, "failed to reap view"),
        }
    }
}
