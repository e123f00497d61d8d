use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::Signal;

use shipctl::models::record::StateRecord;
use shipctl::supervisor::liveness::{LivenessProbe, Signaller};
use shipctl::supervisor::state_store::{MemoryStateStore, StateStore};
use shipctl::supervisor::target::Target;
use shipctl::supervisor::terminator::{self, StopOutcome, StopSettings};
use shipctl::AppError;

/// How the fake process reacts to each signal.
#[derive(Clone, Copy)]
enum Reaction {
    Exit,
    Ignore,
    Refuse,
}

struct FakeProcess {
    alive: Mutex<HashSet<i32>>,
    on_term: Reaction,
    on_kill: Reaction,
    group_works: bool,
    delivered: Mutex<Vec<(&'static str, Signal)>>,
}

impl FakeProcess {
    fn new(pid: i32, on_term: Reaction, on_kill: Reaction) -> Self {
        Self {
            alive: Mutex::new(HashSet::from([pid])),
            on_term,
            on_kill,
            group_works: true,
            delivered: Mutex::new(Vec::new()),
        }
    }

    fn react(&self, pid: i32, signal: Signal) -> Result<(), Errno> {
        let reaction = if signal == Signal::SIGKILL {
            self.on_kill
        } else {
            self.on_term
        };
        match reaction {
            Reaction::Exit => {
                self.alive.lock().unwrap().remove(&pid);
                Ok(())
            }
            Reaction::Ignore => Ok(()),
            Reaction::Refuse => Err(Errno::EPERM),
        }
    }

    fn delivered(&self) -> Vec<(&'static str, Signal)> {
        self.delivered.lock().unwrap().clone()
    }
}

impl LivenessProbe for FakeProcess {
    fn is_alive(&self, pid: i32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }
}

impl Signaller for FakeProcess {
    fn signal_group(&self, pgid: i32, signal: Signal) -> Result<(), Errno> {
        self.delivered.lock().unwrap().push(("group", signal));
        if !self.group_works {
            return Err(Errno::ESRCH);
        }
        self.react(pgid, signal)
    }

    fn signal_pid(&self, pid: i32, signal: Signal) -> Result<(), Errno> {
        self.delivered.lock().unwrap().push(("pid", signal));
        self.react(pid, signal)
    }
}

fn settings() -> StopSettings {
    StopSettings {
        deadline: Duration::from_millis(300),
        poll_interval: Duration::from_millis(20),
        kill_confirm: Duration::from_millis(20),
    }
}

fn recorded(pid: i32) -> (MemoryStateStore, Target) {
    let store = MemoryStateStore::default();
    let target = Target::project("app", std::path::Path::new("/state")).unwrap();
    store
        .write(&target, &StateRecord::launched(pid, Some("serve".into()), None, None))
        .unwrap();
    (store, target)
}

#[tokio::test]
async fn nothing_recorded_is_not_running() {
    let store = MemoryStateStore::default();
    let target = Target::project("app", std::path::Path::new("/state")).unwrap();
    let fake = FakeProcess::new(1, Reaction::Exit, Reaction::Exit);

    let outcome = terminator::stop(&store, &fake, &fake, &target, settings())
        .await
        .unwrap();

    assert_eq!(outcome, StopOutcome::NotRunning);
    assert!(outcome.is_success());
    assert!(fake.delivered().is_empty());
}

#[tokio::test]
async fn stale_pid_is_cleared_without_signalling() {
    let (store, target) = recorded(500);
    let fake = FakeProcess::new(501, Reaction::Exit, Reaction::Exit);

    let outcome = terminator::stop(&store, &fake, &fake, &target, settings())
        .await
        .unwrap();

    assert_eq!(outcome, StopOutcome::AlreadyExited { pid: 500 });
    assert_eq!(outcome.pid(), None);
    assert!(store.read(&target).is_empty());
    assert!(fake.delivered().is_empty());
}

#[tokio::test]
async fn cooperative_process_terminates_before_deadline() {
    let (store, target) = recorded(600);
    let fake = FakeProcess::new(600, Reaction::Exit, Reaction::Exit);

    let started = Instant::now();
    let outcome = terminator::stop(&store, &fake, &fake, &target, settings())
        .await
        .unwrap();

    assert_eq!(outcome, StopOutcome::Terminated { pid: 600 });
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(fake.delivered(), vec![("group", Signal::SIGTERM)]);
    assert!(store.read(&target).is_empty());
}

#[tokio::test]
async fn stubborn_process_is_killed_after_deadline() {
    let (store, target) = recorded(700);
    let fake = FakeProcess::new(700, Reaction::Ignore, Reaction::Exit);

    let started = Instant::now();
    let outcome = terminator::stop(&store, &fake, &fake, &target, settings())
        .await
        .unwrap();

    assert_eq!(outcome, StopOutcome::Killed { pid: 700 });
    assert!(outcome.is_success());
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(
        fake.delivered(),
        vec![("group", Signal::SIGTERM), ("group", Signal::SIGKILL)]
    );
    assert!(store.read(&target).is_empty());
}

#[tokio::test]
async fn falls_back_to_pid_when_group_is_gone() {
    let (store, target) = recorded(800);
    let mut fake = FakeProcess::new(800, Reaction::Exit, Reaction::Exit);
    fake.group_works = false;

    let outcome = terminator::stop(&store, &fake, &fake, &target, settings())
        .await
        .unwrap();

    assert_eq!(outcome, StopOutcome::Terminated { pid: 800 });
    assert_eq!(
        fake.delivered(),
        vec![("group", Signal::SIGTERM), ("pid", Signal::SIGTERM)]
    );
}

#[tokio::test]
async fn refused_terminate_keeps_state() {
    let (store, target) = recorded(900);
    let fake = FakeProcess::new(900, Reaction::Refuse, Reaction::Exit);

    let err = terminator::stop(&store, &fake, &fake, &target, settings())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::TerminationFailed(_)));
    assert_eq!(store.read(&target).pid, Some(900));
}

#[tokio::test]
async fn survivor_of_kill_is_not_success() {
    let (store, target) = recorded(1000);
    let fake = FakeProcess::new(1000, Reaction::Ignore, Reaction::Ignore);

    let outcome = terminator::stop(&store, &fake, &fake, &target, settings())
        .await
        .unwrap();

    assert_eq!(outcome, StopOutcome::ForceKillUnconfirmed { pid: 1000 });
    assert!(!outcome.is_success());
    assert_eq!(outcome.pid(), Some(1000));
    assert!(store.read(&target).is_empty());
}

#[tokio::test]
async fn refused_kill_is_reported() {
    let (store, target) = recorded(1100);
    let fake = FakeProcess::new(1100, Reaction::Ignore, Reaction::Refuse);

    let outcome = terminator::stop(&store, &fake, &fake, &target, settings())
        .await
        .unwrap();

    assert_eq!(outcome, StopOutcome::KillFailed { pid: 1100 });
    assert!(!outcome.is_success());
}
