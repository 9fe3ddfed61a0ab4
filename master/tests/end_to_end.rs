//! End-to-end checks that spawn the actual `master` binary against the
//! reference `grid-player`. Both scenarios below are folded into a single
//! `#[test]` rather than split across functions, since every run claims the
//! fixed `/game_state`/`/game_sync` POSIX names and two concurrent masters
//! on the same machine would collide (mirrors the "idempotent-safe only
//! across clean shutdowns" contract documented on shared memory creation).

use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

fn target_dir() -> PathBuf {
    let mut path = std::env::current_exe().expect("path to this test binary");
    path.pop(); // deps/
    path.pop(); // debug/ or release/
    path
}

fn sibling_binary(name: &str) -> PathBuf {
    let mut path = target_dir();
    path.push(name);
    path
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let start = Instant::now();
    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn master_lifecycle() {
    let master = sibling_binary("master");

    let mut no_players = Command::new(&master).spawn().expect("spawning master with no players");
    let status = wait_with_timeout(&mut no_players, Duration::from_secs(5))
        .expect("master should reject an empty player list quickly rather than hang");
    assert!(!status.success(), "master should not succeed with zero players configured");

    let player = sibling_binary("grid-player");
    let mut game = Command::new(&master)
        .args(["-w", "3", "-h", "3", "-t", "2", "-d", "5"])
        .arg("-p")
        .arg(&player)
        .arg("-p")
        .arg(&player)
        .spawn()
        .expect("spawning master with two reference players");

    let status = wait_with_timeout(&mut game, Duration::from_secs(20))
        .expect("a two-player game on a 3x3 board with a 2s inactivity timeout should terminate well within 20s");
    assert!(status.success(), "master exited with failure: {status:?}");
}
