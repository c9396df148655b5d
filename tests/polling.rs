//! Polling controller tests against an in-memory mailbox.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use email_code::matcher::ConfirmationCodeMatcher;
use email_code::{
    wait_for_code, wait_for_code_with, Error, Mailbox, MailboxGuard, PollingConfig, Result,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// ─────────────────────────────────────────────────────────────────────────────
// Fake mailbox
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Select,
    Fetch(u32),
    Close,
    Logout,
}

/// Messages become visible once the inbox has been selected `visible_from` times.
///
/// Calls are also copied to `journal` when set, so they stay observable after
/// the mailbox moves into a guard.
#[derive(Default)]
struct FakeMailbox {
    messages: Vec<(u32, Vec<u8>)>,
    selects: u32,
    calls: Vec<Call>,
    journal: Option<Arc<Mutex<Vec<Call>>>>,
    fail_close: bool,
    close_delay: Option<Duration>,
}

impl FakeMailbox {
    fn with_messages(messages: Vec<Vec<u8>>) -> Self {
        Self {
            messages: messages.into_iter().map(|m| (0, m)).collect(),
            ..Self::default()
        }
    }

    fn deliver_on_select(mut self, round: u32, message: Vec<u8>) -> Self {
        self.messages.push((round, message));
        self
    }

    fn visible(&self) -> Vec<&Vec<u8>> {
        self.messages
            .iter()
            .filter(|(round, _)| *round <= self.selects)
            .map(|(_, message)| message)
            .collect()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    fn record(&mut self, call: Call) {
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(call.clone());
        }
        self.calls.push(call);
    }

    fn journaled(mut self) -> (Self, Arc<Mutex<Vec<Call>>>) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        self.journal = Some(Arc::clone(&journal));
        (self, journal)
    }
}

impl Mailbox for FakeMailbox {
    async fn select_inbox(&mut self, read_only: bool) -> Result<u32> {
        assert!(read_only, "polling must not select the inbox read-write");
        self.selects += 1;
        self.record(Call::Select);
        Ok(u32::try_from(self.visible().len()).unwrap())
    }

    async fn fetch(&mut self, index: u32) -> Result<Vec<Vec<u8>>> {
        self.record(Call::Fetch(index));
        Ok(vec![self.visible()[index as usize - 1].clone()])
    }

    async fn close(&mut self) -> Result<()> {
        self.record(Call::Close);
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_close {
            return Err(Error::CloseTimeout {
                timeout: Duration::from_secs(5),
            });
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.record(Call::Logout);
        Ok(())
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 15, 12, 0, 0).unwrap()
}

fn email_at(from: &str, subject: &str, at: DateTime<Utc>) -> Vec<u8> {
    format!(
        "From: {from}\r\nSubject: {subject}\r\nDate: {}\r\n\r\nbody",
        at.format("%a, %d %b %Y %H:%M:%S %z")
    )
    .into_bytes()
}

fn code_email(code: &str, minutes: i64) -> Vec<u8> {
    email_at(
        "X <info@x.com>",
        &format!("Your Twitter confirmation code is {code}"),
        base_time() + ChronoDuration::minutes(minutes),
    )
}

fn noise_email(minutes: i64) -> Vec<u8> {
    email_at(
        "news@example.com",
        "Weekly digest",
        base_time() + ChronoDuration::minutes(minutes),
    )
}

fn polling(timeout_secs: u64) -> PollingConfig {
    PollingConfig {
        interval: Duration::from_secs(5),
        timeout: Duration::from_secs(timeout_secs),
    }
}

/// The last two calls must be the cleanup pair, and it happened exactly once.
fn assert_released_once(mailbox: &FakeMailbox) {
    assert_eq!(mailbox.count(&Call::Close), 1);
    let tail = &mailbox.calls[mailbox.calls.len() - 2..];
    assert_eq!(tail, &[Call::Select, Call::Close]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_code_already_present() {
    let mut mailbox = FakeMailbox::with_messages(vec![noise_email(1), code_email("123456", 2)]);

    let started = Instant::now();
    let code = wait_for_code(&mut mailbox, "user@example.com", None, &polling(30))
        .await
        .unwrap();

    assert_eq!(code, "123456");
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(
        mailbox.calls,
        vec![Call::Select, Call::Fetch(2), Call::Select, Call::Close]
    );
}

#[tokio::test(start_paused = true)]
async fn test_code_arrives_on_later_poll() {
    let mut mailbox = FakeMailbox::with_messages(vec![noise_email(1)])
        .deliver_on_select(3, code_email("654321", 5));

    let started = Instant::now();
    let code = wait_for_code(&mut mailbox, "user@example.com", None, &polling(30))
        .await
        .unwrap();

    assert_eq!(code, "654321");
    // Two empty rounds, each followed by one interval
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_released_once(&mailbox);
}

#[tokio::test(start_paused = true)]
async fn test_times_out_and_releases_once() {
    let mut mailbox = FakeMailbox::with_messages(vec![noise_email(1), noise_email(2)]);

    let started = Instant::now();
    let err = wait_for_code(&mut mailbox, "user@example.com", None, &polling(1))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    match err {
        Error::CodeTimeout { timeout } => assert_eq!(timeout, Duration::from_secs(1)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed <= Duration::from_secs(1) + Duration::from_secs(5));
    assert_released_once(&mailbox);
}

#[tokio::test(start_paused = true)]
async fn test_stale_code_is_ignored_after_cutoff() {
    let min_t = base_time() + ChronoDuration::minutes(10);
    let mut mailbox = FakeMailbox::with_messages(vec![code_email("111111", 1), noise_email(11)]);

    let err = wait_for_code(&mut mailbox, "user@example.com", Some(min_t), &polling(1))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CodeTimeout { .. }));
    // Message 1 is fetched to read its date, then the round ends
    assert!(mailbox.calls.contains(&Call::Fetch(1)));
    assert_released_once(&mailbox);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_code_after_cutoff_is_returned() {
    let min_t = base_time() + ChronoDuration::minutes(10);
    let mut mailbox = FakeMailbox::with_messages(vec![code_email("111111", 1)])
        .deliver_on_select(2, code_email("222222", 12));

    let code = wait_for_code(&mut mailbox, "user@example.com", Some(min_t), &polling(30))
        .await
        .unwrap();

    assert_eq!(code, "222222");
    assert_released_once(&mailbox);
}

#[tokio::test(start_paused = true)]
async fn test_scan_error_still_releases() {
    let mut mailbox =
        FakeMailbox::with_messages(vec![b"From: info@x.com\r\nDate: not a date\r\n\r\n".to_vec()]);

    let err = wait_for_code(&mut mailbox, "user@example.com", None, &polling(30))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ParseDate { .. }));
    assert_released_once(&mailbox);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_failure_does_not_mask_code() {
    let mut mailbox = FakeMailbox {
        fail_close: true,
        ..FakeMailbox::with_messages(vec![code_email("777777", 1)])
    };

    let code = wait_for_code(&mut mailbox, "user@example.com", None, &polling(30))
        .await
        .unwrap();
    assert_eq!(code, "777777");
    assert_eq!(mailbox.count(&Call::Close), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_failure_does_not_mask_timeout() {
    let mut mailbox = FakeMailbox {
        fail_close: true,
        ..FakeMailbox::with_messages(vec![noise_email(1)])
    };

    let err = wait_for_code(&mut mailbox, "user@example.com", None, &polling(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CodeTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_custom_matcher() {
    let mut mailbox = FakeMailbox::with_messages(vec![
        code_email("123456", 1),
        email_at(
            "security@example.com",
            "Your login PIN is 0042",
            base_time(),
        ),
    ]);
    let matcher = ConfirmationCodeMatcher::new("security@example.com", "login pin is");

    let code = wait_for_code_with(
        &mut mailbox,
        "user@example.com",
        None,
        &polling(30),
        &matcher,
    )
    .await
    .unwrap();
    assert_eq!(code, "0042");
}

// ─────────────────────────────────────────────────────────────────────────────
// Guarded waits
// ─────────────────────────────────────────────────────────────────────────────

fn count_in(journal: &Arc<Mutex<Vec<Call>>>, call: &Call) -> usize {
    journal.lock().unwrap().iter().filter(|c| *c == call).count()
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_guarded_wait_releases_inbox() {
    let (mailbox, journal) = FakeMailbox::with_messages(vec![noise_email(1)]).journaled();

    let task = tokio::spawn(async move {
        let mut guard = MailboxGuard::from_mailbox(mailbox, "user@example.com", polling(30));
        guard.wait_for_code(None).await
    });

    // Two rounds at 0s and 5s, then the task sleeps until 10s
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(count_in(&journal, &Call::Select), 2);
    assert_eq!(count_in(&journal, &Call::Close), 0);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    // Let the cleanup spawned by the guard run
    tokio::time::sleep(Duration::from_secs(1)).await;

    let calls = journal.lock().unwrap().clone();
    assert_eq!(count_in(&journal, &Call::Select), 3);
    assert_eq!(count_in(&journal, &Call::Close), 1);
    assert_eq!(
        &calls[calls.len() - 3..],
        &[Call::Select, Call::Close, Call::Logout]
    );
}

#[tokio::test(start_paused = true)]
async fn test_guard_drop_after_wait_only_logs_out() {
    let (mailbox, journal) = FakeMailbox::with_messages(vec![code_email("123456", 1)]).journaled();

    let mut guard = MailboxGuard::from_mailbox(mailbox, "user@example.com", polling(30));
    assert_eq!(guard.email(), "user@example.com");
    assert_eq!(guard.wait_for_code(None).await.unwrap(), "123456");
    drop(guard);

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        *journal.lock().unwrap(),
        vec![
            Call::Select,
            Call::Fetch(1),
            Call::Select,
            Call::Close,
            Call::Logout
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_release_does_not_release_twice() {
    let (mailbox, journal) = FakeMailbox {
        close_delay: Some(Duration::from_secs(10)),
        ..FakeMailbox::with_messages(vec![code_email("123456", 1)])
    }
    .journaled();

    let task = tokio::spawn(async move {
        let mut guard = MailboxGuard::from_mailbox(mailbox, "user@example.com", polling(30));
        guard.wait_for_code(None).await
    });

    // The code is found at once; CLOSE is now in flight
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(count_in(&journal, &Call::Close), 1);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(count_in(&journal, &Call::Select), 2);
    assert_eq!(count_in(&journal, &Call::Close), 1);
    assert_eq!(journal.lock().unwrap().last(), Some(&Call::Logout));
}

#[tokio::test(start_paused = true)]
async fn test_guard_explicit_logout() {
    let (mailbox, journal) = FakeMailbox::default().journaled();

    let guard = MailboxGuard::from_mailbox(mailbox, "user@example.com", polling(30));
    guard.logout().await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(*journal.lock().unwrap(), vec![Call::Logout]);
}
