use crate::*;

use std::io::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;

use bytes::Bytes;
use ridge_core::{Message, SessionError};
use ridge_session::{FifoWriteQueue, Payload, WriteRequestQueue};

fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("ridge-it-{}-{name}", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents).unwrap();
    path
}

#[test]
fn partial_flush_releases_backpressure_incrementally() {
    let fx = Fixture::quiet();
    let session = fx.session();
    session.suspend_write();

    let future = session.write(Bytes::from(vec![7u8; 100])).unwrap();
    assert_eq!(session.scheduled_write_bytes(), 100);
    assert_eq!(session.scheduled_write_messages(), 1);

    let request = session.poll_write_request().expect("queued");
    assert_eq!(session.increase_written_bytes(&request, 60, 5), 60);
    assert_eq!(session.scheduled_write_bytes(), 40);
    assert!(!session.increase_written_messages(&request, 5));
    assert_eq!(session.scheduled_write_messages(), 1);

    assert_eq!(session.increase_written_bytes(&request, 40, 6), 40);
    assert_eq!(session.scheduled_write_bytes(), 0);
    assert!(session.increase_written_messages(&request, 6));
    assert!(!session.increase_written_messages(&request, 7));
    request.future().set_written();

    assert!(future.is_written());
    assert_eq!(session.scheduled_write_messages(), 0);
    assert_eq!(session.written_bytes(), 100);
    assert_eq!(session.written_messages(), 1);
    assert_eq!(session.last_write_time(), 6);
}

#[test]
fn over_reported_progress_is_capped() {
    let fx = Fixture::quiet();
    let session = fx.session();
    session.suspend_write();
    session.write(Bytes::from(vec![0u8; 100])).unwrap();

    let request = session.poll_write_request().unwrap();
    assert_eq!(session.increase_written_bytes(&request, 500, 1), 100);
    assert_eq!(session.increase_written_bytes(&request, 1, 2), 0);
    assert_eq!(session.written_bytes(), 100);
    assert_eq!(session.scheduled_write_bytes(), 0);
}

#[test]
fn discarding_a_partial_request_releases_only_its_remainder() {
    let fx = Fixture::quiet();
    let session = fx.session();
    session.suspend_write();
    session.write(Bytes::from(vec![0u8; 100])).unwrap();
    session.write(Bytes::from(vec![0u8; 50])).unwrap();

    let first = session.poll_write_request().unwrap();
    session.increase_written_bytes(&first, 60, 1);
    assert_eq!(session.scheduled_write_bytes(), 90);

    session.decrease_scheduled_bytes_and_messages(&first);
    session.decrease_scheduled_bytes_and_messages(&first);
    assert_eq!(session.scheduled_write_bytes(), 50);
    assert_eq!(session.scheduled_write_messages(), 1);
}

#[test]
fn write_after_close_fails_without_touching_counters() {
    let fx = Fixture::quiet();
    let session = fx.session();
    session.close(true);

    let future = session.write(Bytes::from_static(b"too late")).unwrap();
    assert!(future.is_done());
    assert!(future.exception().is_some_and(|e| e.is_closed_session()));
    assert_eq!(fx.chain.writes(), 0);
    assert_eq!(session.scheduled_write_bytes(), 0);
    assert_eq!(session.write_queue_len(), 0);
}

#[test]
fn argument_errors_are_returned_synchronously() {
    let fx = Fixture::quiet();
    let session = fx.session();
    let dest: SocketAddr = "192.0.2.1:9000".parse().unwrap();

    assert_eq!(session.write(Bytes::new()).unwrap_err(), SessionError::EmptyMessage);
    assert_eq!(
        session.write_to(Bytes::from_static(b"x"), Some(dest)).unwrap_err(),
        SessionError::UnsupportedDestination
    );
    assert_eq!(fx.chain.writes(), 0);
}

#[test]
fn connectionless_transport_keeps_destination() {
    let fx = Fixture::with_factory(SessionFactory::new(
        Arc::new(RidgeConfig::default()),
        TransportMetadata::new("mock", "datagram", true),
    ));
    let session = fx.session();
    session.suspend_write();
    let dest: SocketAddr = "192.0.2.1:9000".parse().unwrap();

    session.write_to(Bytes::from_static(b"ping"), Some(dest)).unwrap();
    let request = session.poll_write_request().unwrap();
    assert_eq!(request.destination(), Some(dest));
}

#[test]
fn files_are_sent_as_whole_regions() {
    let fx = Fixture::quiet();
    let session = fx.session();
    session.suspend_write();
    let path = temp_file("region", b"0123456789");

    session.write(path.clone()).unwrap();
    session.write(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(session.scheduled_write_bytes(), 20);

    let by_path = session.poll_write_request().unwrap();
    match by_path.payload() {
        Payload::Region(region) => {
            assert_eq!(region.position(), 0);
            assert_eq!(region.length(), 10);
            assert_eq!(region.path(), Some(path.as_path()));
        }
        other => panic!("expected region, got {other:?}"),
    }
    let by_handle = session.poll_write_request().unwrap();
    assert!(matches!(by_handle.payload(), Payload::Region(r) if r.length() == 10));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn objects_count_as_messages_without_bytes() {
    let fx = Fixture::quiet();
    let session = fx.session();
    session.suspend_write();

    session.write(Message::object("encoded later")).unwrap();
    assert_eq!(session.scheduled_write_bytes(), 0);
    assert_eq!(session.scheduled_write_messages(), 1);

    assert_eq!(flush_all(&session, 3), 1);
    assert_eq!(session.scheduled_write_messages(), 0);
    assert_eq!(session.written_messages(), 1);
    assert_eq!(session.written_bytes(), 0);
}

#[test]
fn concurrent_writers_keep_counters_exact() {
    let fx = Fixture::quiet();
    let session = fx.session();
    session.suspend_write();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for _ in 0..100 {
                    session.write(Bytes::from_static(b"0123456789")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(session.scheduled_write_bytes(), 8_000);
    assert_eq!(session.scheduled_write_messages(), 800);
    assert_eq!(flush_all(&session, 10), 800);
    assert_eq!(session.scheduled_write_bytes(), 0);
    assert_eq!(session.scheduled_write_messages(), 0);
    assert_eq!(session.written_bytes(), 8_000);
    assert_eq!(session.written_messages(), 800);
}

#[test]
fn resume_write_asks_processor_to_reconsider() {
    let fx = Fixture::quiet();
    let session = fx.session();

    session.write(Bytes::from_static(b"a")).unwrap();
    assert_eq!(fx.processor.flushes(), 1);

    session.suspend_write();
    session.write(Bytes::from_static(b"b")).unwrap();
    assert_eq!(fx.processor.flushes(), 1);

    session.resume_write();
    assert!(!session.is_write_suspended());
    assert_eq!(fx.processor.traffic_updates(), 2);
}

#[test]
fn current_write_request_is_visible_to_other_threads() {
    let fx = Fixture::quiet();
    let session = fx.session();
    session.suspend_write();
    session.write(Bytes::from_static(b"hello")).unwrap();

    let request = session.poll_write_request().unwrap();
    session.set_current_write_request(Some(Arc::clone(&request)));

    let observer = Arc::clone(&session);
    let seen = thread::spawn(move || observer.current_write_message())
        .join()
        .unwrap();
    assert!(matches!(seen, Some(Payload::Buffer(b)) if b.as_ref() == b"hello"));

    assert!(session.take_current_write_request().is_some());
    assert!(session.current_write_request().is_none());
}

struct CountingQueue {
    inner: FifoWriteQueue,
    offered: AtomicUsize,
}

impl WriteRequestQueue for CountingQueue {
    fn offer(&self, request: Arc<WriteRequest>) {
        self.offered.fetch_add(1, Ordering::SeqCst);
        self.inner.offer(request);
    }

    fn poll(&self) -> Option<Arc<WriteRequest>> {
        self.inner.poll()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn dispose(&self) {
        self.inner.dispose();
    }
}

#[test]
fn injected_queue_receives_requests_and_sentinel() {
    let fx = Fixture::quiet();
    let queue = Arc::new(CountingQueue {
        inner: FifoWriteQueue::new(),
        offered: AtomicUsize::new(0),
    });

    struct Shared(Arc<CountingQueue>);
    impl WriteRequestQueue for Shared {
        fn offer(&self, request: Arc<WriteRequest>) {
            self.0.offer(request)
        }
        fn poll(&self) -> Option<Arc<WriteRequest>> {
            self.0.poll()
        }
        fn len(&self) -> usize {
            self.0.len()
        }
        fn clear(&self) {
            self.0.clear()
        }
        fn dispose(&self) {
            self.0.dispose()
        }
    }

    let session = fx
        .factory
        .builder(fx.processor.clone(), fx.chain.clone())
        .write_queue(Box::new(Shared(Arc::clone(&queue))))
        .build();

    session.write(Bytes::from_static(b"one")).unwrap();
    session.close(false);
    assert_eq!(queue.offered.load(Ordering::SeqCst), 2);
    assert_eq!(flush_all(&session, 1), 1);
    assert!(!session.is_connected());
}
