//! End-to-end runs of the sysdemo binary
//!
//! Fork-based demonstrations are exercised here, in a fresh single-threaded
//! process, rather than inside the multi-threaded test harness.

use assert_cmd::prelude::*;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use predicates::prelude::*;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Binary with an isolated HOME so no user settings file leaks in
struct Sandbox {
    home: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("temp dir"),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("sysdemo").expect("binary built");
        cmd.env("HOME", self.home.path());
        cmd.env_remove("SYSDEMO_CONFIG");
        cmd.env("RUST_LOG", "off");
        cmd
    }
}

fn pid_field(line: &str, key: &str) -> i64 {
    line.split_whitespace()
        .find_map(|field| field.strip_prefix(key))
        .and_then(|value| value.trim_end_matches(',').parse().ok())
        .unwrap_or_else(|| panic!("no {key} in {line:?}"))
}

#[test]
fn help_lists_subcommands() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fork"))
        .stdout(predicate::str::contains("semaphore"))
        .stdout(predicate::str::contains("shm"));
}

#[test]
fn list_prints_catalog() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("count"))
        .stdout(predicate::str::contains("named shared memory segment"));
}

#[test]
fn fork_reports_child_and_parent_identities() {
    let sandbox = Sandbox::new();
    let output = sandbox.command().arg("fork").output().expect("run fork");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();

    let before = lines
        .iter()
        .find(|line| line.starts_with("before fork "))
        .expect("before fork line");
    let parent_pid = pid_field(before, "pid=");

    let inside = lines
        .iter()
        .find(|line| line.starts_with("inside (pid == 0) "))
        .expect("child line");
    let child_pid = pid_field(inside, "pid=");
    assert_ne!(child_pid, parent_pid);
    assert_eq!(pid_field(inside, "ppid="), parent_pid);

    assert_eq!(lines.iter().filter(|line| line.starts_with("after fork ")).count(), 2);
    assert_eq!(lines.iter().filter(|line| line.starts_with("before fork ")).count(), 1);

    let fork_return = lines
        .iter()
        .find_map(|line| line.strip_prefix("fork() return = "))
        .expect("fork return line");
    assert_eq!(fork_return.parse::<i64>().unwrap(), child_pid);

    let after_wait = lines
        .iter()
        .find(|line| line.starts_with("after wait "))
        .expect("after wait line");
    assert_eq!(pid_field(after_wait, "pid="), parent_pid);
}

#[test]
fn count_stops_after_requested_ticks() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .args(["count", "--period", "1000", "--ticks", "3"])
        .assert()
        .success()
        .stdout("1\n2\n3\n");
}

#[test]
fn count_stops_cleanly_on_sigterm() {
    let sandbox = Sandbox::new();
    let mut child = sandbox
        .command()
        .args(["count", "--period", "100000"])
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn count");

    let mut stdout = BufReader::new(child.stdout.take().expect("piped stdout"));
    // The stop handler is installed before the first tick is printed
    let mut first = String::new();
    stdout.read_line(&mut first).expect("first tick");
    assert_eq!(first, "1\n");

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).expect("send SIGTERM");

    let mut rest = String::new();
    stdout.read_to_string(&mut rest).expect("drain stdout");
    let status = child.wait().expect("wait count");
    assert!(status.success(), "count exited with {status:?}");

    let lines: Vec<&str> = first.lines().chain(rest.lines()).collect();
    let summary = lines.last().expect("summary line");
    let reported: u64 = summary
        .strip_prefix("interrupted after ")
        .and_then(|tail| tail.strip_suffix(" ticks"))
        .and_then(|n| n.parse().ok())
        .unwrap_or_else(|| panic!("unexpected summary {summary:?}"));
    assert!(reported >= 1);
    assert_eq!(reported as usize, lines.len() - 1, "every printed tick is counted");
}

#[test]
fn count_rejects_zero_period() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .args(["count", "--period", "0", "--ticks", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[validation]"));
}

#[test]
fn signal_handler_counts_every_delivery() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .args(["signal", "--signal", "usr2", "--count", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("raised SIGUSR2 (3/3), handler ran 3 times"))
        .stdout(predicate::str::contains("kill(self, 0): alive=true"))
        .stdout(predicate::str::is_match(r"before wait: alive=true").unwrap())
        .stdout(predicate::str::is_match(r"after wait: alive=false").unwrap());
}

#[test]
fn semaphore_child_pid_matches_fork_return() {
    let sandbox = Sandbox::new();
    let output = sandbox.command().arg("semaphore").output().expect("run semaphore");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let line = stdout
        .lines()
        .find(|line| line.starts_with("parent: child reported pid="))
        .expect("report line");
    let reported = pid_field(line, "pid=");
    let returned: i64 = line.rsplit(' ').next().unwrap().parse().unwrap();
    assert_eq!(reported, returned);
}

#[test]
fn mmap_shared_vs_private() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .args(["mmap", "--message", "mapped text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("file via mmap: \"mapped text\""))
        .stdout(predicate::str::contains("MAP_SHARED counter after child increment: 1"))
        .stdout(predicate::str::contains("MAP_PRIVATE counter after child increment: 0"));
}

#[test]
fn mutex_total_matches() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .args(["mutex", "--threads", "3", "--iterations", "1000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("final counter = 3000 (expected 3000)"));
}

#[test]
fn socket_echo_over_both_domains() {
    let sandbox = Sandbox::new();
    for domain in ["inet", "unix"] {
        sandbox
            .command()
            .args(["socket", "--domain", domain, "--message", "ping"])
            .assert()
            .success()
            .stdout(predicate::str::contains("sent 4 bytes, echoed \"ping\""));
    }
}

#[test]
fn shm_children_increment_shared_counter() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .args(["shm", "--children", "3", "--iterations", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("counter = 1500 (expected 1500)"));
}

#[test]
fn settings_file_supplies_defaults() {
    let sandbox = Sandbox::new();
    let dir = sandbox.home.path().join(".sysdemo");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[mutex]\nthreads = 2\niterations = 7\n").unwrap();

    sandbox
        .command()
        .arg("mutex")
        .assert()
        .success()
        .stdout(predicate::str::contains("final counter = 14 (expected 14)"));
}

#[test]
fn environment_overrides_settings_file() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .env("SYSDEMO__SHM__CHILDREN", "1")
        .env("SYSDEMO__SHM__ITERATIONS", "4")
        .arg("shm")
        .assert()
        .success()
        .stdout(predicate::str::contains("counter = 4 (expected 4)"));
}
