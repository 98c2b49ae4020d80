/*!
 * Process Runner Tests
 * Admission, pause/resume, termination and child adoption on a live runner
 */

use cothread::{
    CapabilityMask, ConfigError, Process, ProcessEntry, ProcessRunner, ProcessStep,
    RunnerConfig, RunnerStatus, SchedulerError,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const PATIENCE: Duration = Duration::from_secs(5);

fn eventually<F: Fn() -> bool>(check: F) -> bool {
    let deadline = Instant::now() + PATIENCE;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    check()
}

type Journal = Arc<Mutex<Vec<String>>>;

/// Counts slices; succeeds after `target` slices when one is set
struct Counter {
    label: &'static str,
    progress: Arc<AtomicU64>,
    target: Option<u64>,
    journal: Journal,
    keep_on_success: bool,
}

impl Counter {
    fn endless(label: &'static str, progress: &Arc<AtomicU64>, journal: &Journal) -> Self {
        Self {
            label,
            progress: Arc::clone(progress),
            target: None,
            journal: Arc::clone(journal),
            keep_on_success: false,
        }
    }

    fn finite(label: &'static str, target: u64, progress: &Arc<AtomicU64>, journal: &Journal) -> Self {
        Self {
            target: Some(target),
            ..Self::endless(label, progress, journal)
        }
    }

    fn note(&self, hook: &str) {
        self.journal.lock().push(format!("{}:{}", self.label, hook));
    }
}

impl Process for Counter {
    fn run(&mut self, _slice: Duration) -> ProcessStep {
        let done = self.progress.fetch_add(1, Ordering::SeqCst) + 1;
        match self.target {
            Some(target) if done >= target => ProcessStep::Succeeded,
            _ => ProcessStep::Continue,
        }
    }

    fn on_start(&mut self) {
        self.note("start");
    }

    fn on_pause(&mut self) {
        self.note("pause");
    }

    fn on_resume(&mut self) {
        self.note("resume");
    }

    fn on_success(&mut self) -> bool {
        self.note("success");
        !self.keep_on_success
    }

    fn on_termination(&mut self) -> bool {
        self.note("termination");
        true
    }

    fn on_failure(&mut self) -> bool {
        self.note("failure");
        true
    }
}

struct Faulty;

impl Process for Faulty {
    fn run(&mut self, _slice: Duration) -> ProcessStep {
        ProcessStep::Failed
    }
}

struct Exploding {
    journal: Journal,
}

impl Process for Exploding {
    fn run(&mut self, _slice: Duration) -> ProcessStep {
        panic!("slice exploded");
    }

    fn on_failure(&mut self) -> bool {
        self.journal.lock().push("exploding:failure".to_string());
        true
    }
}

fn started(name: &str) -> ProcessRunner {
    let runner = ProcessRunner::new(RunnerConfig::new(name));
    runner.start().unwrap();
    runner
}

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn has_entry(journal: &Journal, entry: &str) -> bool {
    journal.lock().iter().any(|e| e == entry)
}

#[test]
fn test_start_reaches_running_or_waiting() {
    let runner = started("boot");
    assert!(runner.status().is_active());
    assert!(runner.wait_until_idle(PATIENCE));
    assert_eq!(runner.status(), RunnerStatus::Waiting);

    // second start is ignored
    runner.start().unwrap();
    assert_eq!(runner.shutdown().unwrap(), RunnerStatus::Finished);
    assert_eq!(runner.status(), RunnerStatus::Finished);
}

#[test]
fn test_pause_freezes_and_resume_continues() {
    let runner = started("pause-resume");
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    let pid = runner
        .queue(ProcessEntry::new("spinner", Counter::endless("spinner", &progress, &log)))
        .unwrap();

    assert!(eventually(|| progress.load(Ordering::SeqCst) > 0));
    runner.pause(pid).unwrap();
    assert!(eventually(|| runner.stats().paused == 1));

    let frozen = progress.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(progress.load(Ordering::SeqCst), frozen);
    assert!(runner.has_process(pid));

    runner.resume(pid).unwrap();
    assert!(eventually(|| progress.load(Ordering::SeqCst) > frozen));
    assert_eq!(runner.stats().paused, 0);

    runner.shutdown().unwrap();
    let log = log.lock().clone();
    assert_eq!(
        log,
        vec!["spinner:start", "spinner:pause", "spinner:resume", "spinner:termination"]
    );
}

#[test]
fn test_idle_wait_sees_posted_messages_applied() {
    let runner = started("settled");
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    assert!(runner.wait_until_idle(PATIENCE));

    for round in 1..=20u64 {
        let mut counter = Counter::finite("kept", 1, &progress, &log);
        counter.keep_on_success = true;
        runner.queue(ProcessEntry::new("kept", counter)).unwrap();

        assert!(runner.wait_until_idle(PATIENCE));
        assert_eq!(runner.stats().active, round as usize);
        assert_eq!(progress.load(Ordering::SeqCst), round);
    }

    let spin = Arc::new(AtomicU64::new(0));
    let pid = runner
        .queue(ProcessEntry::new("spin", Counter::endless("spin", &spin, &log)))
        .unwrap();
    runner.pause(pid).unwrap();
    assert!(runner.wait_until_idle(PATIENCE));
    assert_eq!(runner.stats().paused, 1);
    assert_eq!(runner.stats().active, 21);
}

#[test]
fn test_stop_ends_after_current_round() {
    let runner = started("stop-mid-run");
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    runner
        .queue(ProcessEntry::new("endless", Counter::endless("endless", &progress, &log)))
        .unwrap();
    assert!(eventually(|| progress.load(Ordering::SeqCst) > 0));

    runner.quit().unwrap();
    let rounds_at_stop = runner.stats().rounds;
    assert_eq!(runner.join().unwrap(), RunnerStatus::Finished);
    assert_eq!(runner.status(), RunnerStatus::Finished);
    assert!(runner.stats().rounds <= rounds_at_stop + 1);

    let final_progress = progress.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(progress.load(Ordering::SeqCst), final_progress);
    assert!(has_entry(&log, "endless:termination"));
    assert_eq!(runner.stats().active, 0);
}

#[test]
fn test_zero_limits_fail_to_start() {
    let runner = ProcessRunner::new(RunnerConfig::new("zero").with_queue_capacity(0));
    assert_eq!(
        runner.start().unwrap_err(),
        SchedulerError::Config(ConfigError::ZeroValue {
            field: "queue_capacity".into()
        })
    );
    assert_eq!(runner.status(), RunnerStatus::FailedToStart);
    assert!(matches!(
        runner.quit(),
        Err(SchedulerError::NotRunning(_))
    ));

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        drop(runner);
        let _ = done_tx.send(());
    });
    assert!(done_rx.recv_timeout(PATIENCE).is_ok());

    let empty = ProcessRunner::new(RunnerConfig::new("no-room").with_max_entities(0));
    assert!(matches!(
        empty.start(),
        Err(SchedulerError::Config(ConfigError::ZeroValue { .. }))
    ));
}

#[test]
fn test_pause_by_name_only_affects_running() {
    let runner = started("named");
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    runner
        .queue(ProcessEntry::new("worker", Counter::endless("worker", &progress, &log)))
        .unwrap();
    assert!(eventually(|| progress.load(Ordering::SeqCst) > 0));

    runner.pause_named("worker").unwrap();
    runner.pause_named("worker").unwrap();
    assert!(eventually(|| runner.stats().messages_applied >= 3));
    assert_eq!(runner.stats().paused, 1);

    runner.resume_named("worker").unwrap();
    assert!(eventually(|| runner.stats().paused == 0));
    assert!(runner.has_process_named("worker"));
    assert!(!runner.has_process_named("nobody"));
}

#[test]
fn test_every_running_process_makes_progress() {
    let runner = started("fair");
    let log = journal();
    let counters: Vec<_> = (0..3).map(|_| Arc::new(AtomicU64::new(0))).collect();
    for (i, progress) in counters.iter().enumerate() {
        let label = ["a", "b", "c"][i];
        runner
            .queue(ProcessEntry::new(label, Counter::endless(label, progress, &log)))
            .unwrap();
    }

    assert!(eventually(|| counters
        .iter()
        .all(|c| c.load(Ordering::SeqCst) >= 10)));
    assert_eq!(runner.stats().active, 3);
}

#[test]
fn test_finished_process_is_reclaimed() {
    let runner = started("finite");
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    let pid = runner
        .queue(ProcessEntry::new("five", Counter::finite("five", 5, &progress, &log)))
        .unwrap();

    assert!(eventually(|| !runner.has_process(pid)));
    assert_eq!(progress.load(Ordering::SeqCst), 5);
    assert!(has_entry(&log, "five:success"));
    assert!(eventually(|| runner.admitted() == 0));
    assert!(eventually(|| runner.stats().entities_reclaimed == 1));
}

#[test]
fn test_kept_process_stays_until_terminate_all() {
    let runner = started("keeper");
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    let mut counter = Counter::finite("kept", 1, &progress, &log);
    counter.keep_on_success = true;
    let pid = runner.queue(ProcessEntry::new("kept", counter)).unwrap();

    assert!(eventually(|| has_entry(&log, "kept:success")));
    assert!(runner.wait_until_idle(PATIENCE));
    assert!(runner.has_process(pid));
    assert_eq!(progress.load(Ordering::SeqCst), 1);

    runner.terminate_all().unwrap();
    assert!(eventually(|| !runner.has_process(pid)));
    // terminal hook already ran, termination hook is skipped
    assert!(!has_entry(&log, "kept:termination"));
}

#[test]
fn test_terminate_runs_hook_and_removes() {
    let runner = started("terminate");
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    let pid = runner
        .queue(ProcessEntry::new("victim", Counter::endless("victim", &progress, &log)))
        .unwrap();
    assert!(eventually(|| progress.load(Ordering::SeqCst) > 0));

    runner.terminate(pid).unwrap();
    assert!(eventually(|| !runner.has_process(pid)));
    assert!(has_entry(&log, "victim:termination"));
    assert!(eventually(|| runner.admitted() == 0));
}

#[test]
fn test_terminate_paused_process() {
    let runner = started("terminate-paused");
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    let pid = runner
        .queue(ProcessEntry::new("sleeper", Counter::endless("sleeper", &progress, &log)))
        .unwrap();
    runner.pause(pid).unwrap();
    assert!(eventually(|| runner.stats().paused == 1));

    runner.terminate(pid).unwrap();
    assert!(eventually(|| !runner.has_process(pid)));
    assert_eq!(runner.stats().paused, 0);
}

#[test]
fn test_failures_fire_failure_hook() {
    let runner = started("failures");
    let log = journal();
    let faulty = runner.queue(ProcessEntry::new("faulty", Faulty)).unwrap();
    let exploding = runner
        .queue(ProcessEntry::new(
            "exploding",
            Exploding {
                journal: Arc::clone(&log),
            },
        ))
        .unwrap();

    assert!(eventually(|| !runner.has_process(faulty) && !runner.has_process(exploding)));
    assert!(has_entry(&log, "exploding:failure"));

    // the runner survives a panicking process
    assert!(runner.status().is_active());
}

#[test]
fn test_child_adopted_after_parent_succeeds() {
    let runner = started("family");
    let log = journal();
    let parent_progress = Arc::new(AtomicU64::new(0));
    let child_progress = Arc::new(AtomicU64::new(0));

    let child = ProcessEntry::new("child", Counter::finite("child", 3, &child_progress, &log));
    let child_pid = child.pid();
    let parent = ProcessEntry::new("parent", Counter::finite("parent", 2, &parent_progress, &log))
        .with_child(child);
    assert_eq!(parent.child().and_then(|c| c.parent_pid()), Some(parent.pid()));

    runner.queue(parent).unwrap();
    assert!(eventually(|| child_progress.load(Ordering::SeqCst) == 3));
    assert!(eventually(|| !runner.has_process(child_pid)));

    let log = log.lock().clone();
    let parent_done = log.iter().position(|e| e == "parent:success").unwrap();
    let child_start = log.iter().position(|e| e == "child:start").unwrap();
    assert!(parent_done < child_start);
}

#[test]
fn test_child_of_terminated_parent_is_dropped() {
    let runner = started("orphan");
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    let child_progress = Arc::new(AtomicU64::new(0));
    let parent = ProcessEntry::new("parent", Counter::endless("parent", &progress, &log)).with_child(
        ProcessEntry::new("child", Counter::finite("child", 1, &child_progress, &log)),
    );
    let pid = runner.queue(parent).unwrap();
    assert!(eventually(|| progress.load(Ordering::SeqCst) > 0));

    runner.terminate(pid).unwrap();
    assert!(eventually(|| !runner.has_process(pid)));
    assert!(runner.wait_until_idle(PATIENCE));
    assert_eq!(child_progress.load(Ordering::SeqCst), 0);
    assert!(!has_entry(&log, "child:start"));
}

#[test]
fn test_full_runner_rejects() {
    let runner = ProcessRunner::new(RunnerConfig::new("tiny").with_max_entities(2));
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    for label in ["one", "two"] {
        runner
            .queue(ProcessEntry::new(label, Counter::endless(label, &progress, &log)))
            .unwrap();
    }
    assert!(runner.is_full());

    let third = ProcessEntry::new("three", Counter::endless("three", &progress, &log));
    assert!(!runner.accepts(&third));
    assert!(matches!(
        runner.queue(third),
        Err(SchedulerError::Rejected { .. })
    ));
}

#[test]
fn test_mailbox_full_is_reported() {
    let runner = ProcessRunner::new(RunnerConfig::new("small-mailbox").with_queue_capacity(1));
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    let pid = runner
        .queue(ProcessEntry::new("only", Counter::endless("only", &progress, &log)))
        .unwrap();

    let err = runner.pause(pid).unwrap_err();
    assert!(matches!(err, SchedulerError::MailboxFull { capacity: 1, .. }));

    let rejected = ProcessEntry::new("late", Counter::endless("late", &progress, &log));
    let late_pid = rejected.pid();
    assert!(runner.queue(rejected).is_err());
    assert!(!runner.has_process(late_pid));
    assert_eq!(runner.admitted(), 1);
}

#[test]
fn test_posts_after_finish_are_refused() {
    let runner = started("closed");
    runner.shutdown().unwrap();

    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    let err = runner
        .queue(ProcessEntry::new("late", Counter::endless("late", &progress, &log)))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::NotRunning(_)));
    assert!(matches!(runner.join(), Err(SchedulerError::NotRunning(_))));
}

#[test]
fn test_active_processes_terminated_on_drop() {
    let log = journal();
    let progress = Arc::new(AtomicU64::new(0));
    {
        let runner = started("dropped");
        runner
            .queue(ProcessEntry::new("loose", Counter::endless("loose", &progress, &log)))
            .unwrap();
        assert!(eventually(|| progress.load(Ordering::SeqCst) > 0));
    }
    assert!(has_entry(&log, "loose:termination"));
}

#[test]
fn test_requested_slice_scales_with_priority() {
    let entry = ProcessEntry::new("weighted", Faulty)
        .with_priority(3)
        .with_priority_modifier(2);
    assert_eq!(
        entry.requested_slice(Duration::from_millis(1)),
        Duration::from_millis(6)
    );
}

proptest! {
    #[test]
    fn prop_admission_requires_every_declared_bit(runner_bits in any::<u32>(), entity_bits in any::<u32>()) {
        let runner = ProcessRunner::new(
            RunnerConfig::new("mask-law").with_mask(CapabilityMask(runner_bits)),
        );
        let entry = ProcessEntry::new("masked", Faulty).with_mask(CapabilityMask(entity_bits));
        prop_assert_eq!(runner.accepts(&entry), runner_bits & entity_bits == entity_bits);
    }
}
