use crate::*;

use std::io;
use std::time::Duration;

use ridge_core::{ReadOutcome, SessionError};

fn reading_fixture() -> Fixture {
    let mut config = RidgeConfig::default();
    config.read.use_read_operation = true;
    Fixture::new(config)
}

fn as_u32(outcome: Option<ReadOutcome>) -> Option<u32> {
    match outcome {
        Some(ReadOutcome::Message(m)) => m.downcast_ref::<u32>().copied(),
        _ => None,
    }
}

#[test]
fn read_is_rejected_unless_enabled() {
    let fx = Fixture::quiet();
    let session = fx.session();
    assert_eq!(session.read().unwrap_err(), SessionError::ReadOperationDisabled);
}

#[test]
fn reads_and_offers_pair_in_order() {
    let fx = reading_fixture();
    let session = fx.session();

    // Offered before anyone reads.
    session.offer_read_future(Arc::new(1u32));
    session.offer_read_future(Arc::new(2u32));

    // Read before anything is offered.
    let first = session.read().unwrap();
    let second = session.read().unwrap();
    let third = session.read().unwrap();
    let fourth = session.read().unwrap();
    assert!(!third.is_done());

    session.offer_read_future(Arc::new(3u32));
    session.offer_read_future(Arc::new(4u32));

    assert_eq!(as_u32(first.outcome()), Some(1));
    assert_eq!(as_u32(second.outcome()), Some(2));
    assert_eq!(as_u32(third.outcome()), Some(3));
    assert_eq!(as_u32(fourth.outcome()), Some(4));
}

#[test]
fn failure_is_delivered_once() {
    let fx = reading_fixture();
    let session = fx.session();

    let cause = Arc::new(io::Error::new(io::ErrorKind::InvalidData, "bad frame"));
    session.offer_failed_read_future(cause);

    let failed = session.read().unwrap();
    assert!(failed.exception().is_some_and(|e| e.to_string() == "bad frame"));
    assert!(!session.read().unwrap().is_done());
}

#[test]
fn close_is_sticky_for_later_readers() {
    let fx = reading_fixture();
    let session = fx.session();

    let waiting = session.read().unwrap();
    session.close(true);

    assert!(waiting.is_closed());
    assert!(session.read().unwrap().is_closed());
    assert!(session.read().unwrap().is_closed());
}

#[tokio::test]
async fn waiting_reader_wakes_on_message() -> anyhow::Result<()> {
    let fx = reading_fixture();
    let session = fx.session();
    let future = session.read()?;

    let producer = Arc::clone(&session);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        producer.offer_read_future(Arc::new(42u32));
    });

    let outcome = tokio::time::timeout(Duration::from_secs(2), future.wait()).await?;
    assert!(matches!(outcome, ReadOutcome::Message(ref m) if m.downcast_ref::<u32>() == Some(&42)));
    Ok(())
}
