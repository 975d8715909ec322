use crate::*;

use bytes::Bytes;
use ridge_session::{notify_idle_session, notify_idleness};

fn idle_fixture(both_ms: u64, reader_ms: u64, writer_ms: u64) -> Fixture {
    let mut config = RidgeConfig::default();
    config.write.timeout_ms = 0;
    config.set_idle_time_ms(IdleStatus::BothIdle, both_ms);
    config.set_idle_time_ms(IdleStatus::ReaderIdle, reader_ms);
    config.set_idle_time_ms(IdleStatus::WriterIdle, writer_ms);
    Fixture::new(config)
}

fn statuses(fx: &Fixture) -> Vec<IdleStatus> {
    fx.chain.idle_events().into_iter().map(|(_, s)| s).collect()
}

#[test]
fn categories_fire_on_independent_cadences() {
    let fx = idle_fixture(300, 100, 200);
    let session = fx.session();

    notify_idle_session(&session, 99);
    assert!(statuses(&fx).is_empty());

    notify_idle_session(&session, 100);
    assert_eq!(statuses(&fx), vec![IdleStatus::ReaderIdle]);

    // Not a full threshold since the last firing.
    notify_idle_session(&session, 150);
    assert_eq!(statuses(&fx).len(), 1);

    notify_idle_session(&session, 200);
    assert_eq!(
        statuses(&fx),
        vec![IdleStatus::ReaderIdle, IdleStatus::ReaderIdle, IdleStatus::WriterIdle]
    );

    notify_idle_session(&session, 300);
    assert_eq!(session.idle_count(IdleStatus::ReaderIdle), 3);
    assert_eq!(session.idle_count(IdleStatus::WriterIdle), 1);
    assert_eq!(session.idle_count(IdleStatus::BothIdle), 1);
    assert!(session.is_idle(IdleStatus::BothIdle));
    assert_eq!(session.last_idle_time(IdleStatus::BothIdle), 300);
}

#[test]
fn read_activity_resets_reader_and_both() {
    let fx = idle_fixture(100, 100, 100);
    let session = fx.session();

    notify_idle_session(&session, 100);
    assert_eq!(statuses(&fx).len(), 3);

    session.increase_read_bytes(16, 120);
    assert_eq!(session.idle_count(IdleStatus::ReaderIdle), 0);
    assert_eq!(session.idle_count(IdleStatus::BothIdle), 0);
    assert_eq!(session.idle_count(IdleStatus::WriterIdle), 1);

    // 79 ms since the read: reader stays quiet, writer fires again.
    notify_idle_session(&session, 199);
    assert_eq!(statuses(&fx).len(), 3);
    notify_idle_session(&session, 200);
    assert_eq!(statuses(&fx).last(), Some(&IdleStatus::WriterIdle));

    notify_idle_session(&session, 220);
    assert_eq!(session.idle_count(IdleStatus::ReaderIdle), 1);
    assert_eq!(session.idle_count(IdleStatus::BothIdle), 1);
}

#[test]
fn zero_read_does_not_count_as_activity() {
    let fx = idle_fixture(0, 100, 0);
    let session = fx.session();

    notify_idle_session(&session, 100);
    session.increase_read_bytes(0, 150);
    assert_eq!(session.idle_count(IdleStatus::ReaderIdle), 1);
    assert_eq!(session.last_read_time(), 0);
}

#[test]
fn disabled_categories_never_fire() {
    let fx = idle_fixture(0, 0, 0);
    let session = fx.session();

    notify_idle_session(&session, 1_000_000);
    assert!(statuses(&fx).is_empty());
    for status in IdleStatus::ALL {
        assert_eq!(session.idle_count(status), 0);
        assert!(!session.is_idle(status));
    }
}

#[test]
fn notify_idleness_covers_every_session() {
    let fx = idle_fixture(0, 50, 0);
    let sessions: Vec<_> = (0..4).map(|_| fx.session()).collect();
    sessions[2].increase_read_messages(40);

    notify_idleness(sessions.iter().map(|s| s.as_ref()), 60);

    let mut fired: Vec<u64> = fx.chain.idle_events().into_iter().map(|(id, _)| id).collect();
    fired.sort_unstable();
    let mut expected: Vec<u64> = [0, 1, 3].iter().map(|&i| sessions[i].id()).collect();
    expected.sort_unstable();
    assert_eq!(fired, expected);
}

fn timeout_fixture(timeout_ms: u64) -> Fixture {
    let mut config = RidgeConfig::default();
    config.write.timeout_ms = timeout_ms;
    Fixture::new(config)
}

#[test]
fn stalled_write_times_out_and_closes() {
    let fx = timeout_fixture(1_000);
    let session = fx.session();
    session.suspend_write();

    let stalled = session.write(Bytes::from(vec![1u8; 64])).unwrap();
    let queued = session.write(Bytes::from(vec![2u8; 32])).unwrap();
    let request = session.poll_write_request().unwrap();
    session.set_current_write_request(Some(request));

    notify_idle_session(&session, 999);
    assert!(session.is_connected());

    notify_idle_session(&session, 1_000);
    assert!(stalled.exception().is_some_and(|e| e.is_timeout()));
    assert!(queued.exception().is_some_and(|e| e.is_closed_session()));
    assert_eq!(fx.chain.exceptions(), vec!["write timed out after 1000 ms".to_string()]);
    assert_eq!(fx.chain.closes(), 1);
    assert!(!session.is_connected());
    assert_eq!(session.scheduled_write_bytes(), 0);
    assert_eq!(session.scheduled_write_messages(), 0);
}

#[test]
fn write_timeout_needs_a_request_in_flight() {
    let fx = timeout_fixture(1_000);
    let session = fx.session();
    session.suspend_write();
    session.write(Bytes::from_static(b"queued only")).unwrap();

    notify_idle_session(&session, 5_000);
    assert!(session.is_connected());
    assert_eq!(fx.chain.closes(), 0);
}

#[test]
fn recent_write_progress_defers_timeout() {
    let fx = timeout_fixture(1_000);
    let session = fx.session();
    session.suspend_write();
    session.write(Bytes::from(vec![0u8; 100])).unwrap();
    session.write(Bytes::from(vec![0u8; 100])).unwrap();

    let request = session.poll_write_request().unwrap();
    session.set_current_write_request(Some(Arc::clone(&request)));
    session.increase_written_bytes(&request, 10, 900);

    notify_idle_session(&session, 1_500);
    assert!(session.is_connected());
    notify_idle_session(&session, 1_900);
    assert!(!session.is_connected());
}
