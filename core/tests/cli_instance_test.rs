//! End-to-end tests for the primary/secondary handoff over the command
//! channel, driving the real binary.

#![cfg(unix)]

mod common;

use std::fs;
use std::net::{Ipv4Addr, TcpListener};
use std::time::{Duration, Instant};

use common::{marker_target, wait_for_exit, wait_until, TestEnv};
use oneclickrunner::instance::{InstanceGuard, InstanceRole};

#[test]
fn test_secondary_forwards_run_to_primary() {
    let env = TestEnv::new();
    let marker = env.path().join("ran.txt");
    let target = marker_target("Marker", &marker);
    env.write_catalog(&[target.clone()]);

    let mut primary = env.spawn_primary(&[]);
    assert!(env.wait_for_channel(), "primary never opened the channel");

    env.cmd().arg(format!("/run:{}", target.id)).assert().success();

    assert!(
        wait_until(Duration::from_secs(10), || marker.exists()),
        "target was not launched"
    );
    // Give a duplicate launch time to show up before counting.
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(fs::read_to_string(&marker).unwrap(), "ran\n");

    env.cmd().arg("/exit").assert().success();
    let status = wait_for_exit(&mut primary, Duration::from_secs(10));
    assert!(status.is_some_and(|s| s.success()), "primary did not exit cleanly");
}

#[test]
fn test_back_to_back_launches_elect_one_primary() {
    let env = TestEnv::new();
    let first_marker = env.path().join("first.txt");
    let second_marker = env.path().join("second.txt");
    let first = marker_target("First", &first_marker);
    let second = marker_target("Second", &second_marker);
    env.write_catalog(&[first.clone(), second.clone()]);

    // No waiting in between: the loser may find the channel not yet open.
    let mut a = env.spawn_primary(&[&format!("/run:{}", first.id)]);
    let mut b = env.spawn_primary(&[&format!("/run:{}", second.id)]);

    assert!(
        wait_until(Duration::from_secs(10), || {
            first_marker.exists() && second_marker.exists()
        }),
        "both requests should be run"
    );
    assert!(
        wait_until(Duration::from_secs(10), || {
            a.try_wait().unwrap().is_some() || b.try_wait().unwrap().is_some()
        }),
        "the secondary should exit after handing off"
    );
    std::thread::sleep(Duration::from_millis(300));

    let a_running = a.try_wait().unwrap().is_none();
    let b_running = b.try_wait().unwrap().is_none();
    assert!(a_running ^ b_running, "expected exactly one primary still running");
    let secondary = if a_running { &mut b } else { &mut a };
    assert!(secondary.try_wait().unwrap().is_some_and(|s| s.success()));

    assert_eq!(fs::read_to_string(&first_marker).unwrap(), "ran\n");
    assert_eq!(fs::read_to_string(&second_marker).unwrap(), "ran\n");

    env.cmd().arg("/exit").assert().success();
    assert!(wait_for_exit(&mut a, Duration::from_secs(10)).is_some());
    assert!(wait_for_exit(&mut b, Duration::from_secs(10)).is_some());
}

#[test]
fn test_concurrent_secondaries_are_each_handled() {
    let env = TestEnv::new();
    let first_marker = env.path().join("first.txt");
    let second_marker = env.path().join("second.txt");
    let first = marker_target("First", &first_marker);
    let second = marker_target("Second", &second_marker);
    env.write_catalog(&[first.clone(), second.clone()]);

    let mut primary = env.spawn_primary(&[]);
    assert!(env.wait_for_channel(), "primary never opened the channel");

    let mut a = env.cmd();
    a.arg(format!("/run:{}", first.id));
    let mut b = env.cmd();
    b.arg(format!("/run:{}", second.id));
    let ta = std::thread::spawn(move || {
        a.assert().success();
    });
    let tb = std::thread::spawn(move || {
        b.assert().success();
    });
    ta.join().unwrap();
    tb.join().unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        first_marker.exists() && second_marker.exists()
    }));

    env.cmd().arg("/exit").assert().success();
    assert!(wait_for_exit(&mut primary, Duration::from_secs(10)).is_some());
}

#[test]
fn test_unknown_id_leaves_primary_running() {
    let env = TestEnv::new();
    env.write_catalog(&[]);

    let mut primary = env.spawn_primary(&[]);
    assert!(env.wait_for_channel(), "primary never opened the channel");

    env.cmd()
        .arg("/run:00000000-0000-0000-0000-000000000001")
        .assert()
        .success();
    env.cmd().arg("/not-a-command").assert().success();

    std::thread::sleep(Duration::from_millis(300));
    assert!(primary.try_wait().unwrap().is_none(), "primary exited early");

    env.cmd().arg("/exit").assert().success();
    assert!(wait_for_exit(&mut primary, Duration::from_secs(10)).is_some());
}

#[test]
fn test_startup_run_argument_is_dispatched_by_primary() {
    let env = TestEnv::new();
    let marker = env.path().join("startup.txt");
    let target = marker_target("Startup", &marker);
    env.write_catalog(&[target.clone()]);

    let mut primary = env.spawn_primary(&[&format!("/run:{}", target.id)]);
    assert!(wait_until(Duration::from_secs(10), || marker.exists()));

    // The primary keeps serving after its own startup command.
    assert!(env.wait_for_channel());
    env.cmd().arg("/exit").assert().success();
    assert!(wait_for_exit(&mut primary, Duration::from_secs(10)).is_some());
}

#[test]
fn test_exit_as_startup_argument_ends_primary() {
    let env = TestEnv::new();

    env.cmd().arg("/exit").assert().success();

    assert!(env.log_contents().contains("Shutting down: exit command"));
}

#[test]
fn test_secondary_without_listening_primary_gives_up_quickly() {
    let env = TestEnv::new();
    let guard = InstanceGuard::acquire(&env.instance).unwrap();
    assert_eq!(guard.role(), InstanceRole::Primary);

    let started = Instant::now();
    env.cmd().arg("/settings").assert().success();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(env.log_contents().contains("Could not forward command"));
}

#[test]
fn test_primary_fails_when_channel_port_is_taken() {
    let env = TestEnv::new();
    let _squatter = TcpListener::bind((Ipv4Addr::LOCALHOST, env.port)).unwrap();

    let output = env.cmd().output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Startup failed"));
}
