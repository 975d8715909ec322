use crate::*;

use std::time::Duration;

use tokio::sync::broadcast;

use ridge_session::{new_session_table, IdleScanner};

fn scanner_fixture(reader_ms: u64, scan_interval_ms: u64) -> Fixture {
    let mut config = RidgeConfig::default();
    config.write.timeout_ms = 0;
    config.idle.reader_ms = reader_ms;
    config.idle.scan_interval_ms = scan_interval_ms;
    Fixture::new(config)
}

#[test]
fn scan_fires_idle_and_prunes_closed_sessions() {
    let fx = scanner_fixture(100, 1_000);
    let table = new_session_table();
    for _ in 0..3 {
        let session = fx.session();
        table.insert(session.id(), session);
    }
    let closed_id = *table.iter().next().unwrap().key();
    table.get(&closed_id).unwrap().close(true);

    let (_tx, rx) = broadcast::channel(1);
    let scanner = IdleScanner::new(table.clone(), Arc::clone(&fx.factory), rx);

    assert_eq!(scanner.scan(150), 1);
    assert_eq!(table.len(), 2);
    assert!(!table.contains_key(&closed_id));

    let events = fx.chain.idle_events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|(id, status)| *id != closed_id && *status == IdleStatus::ReaderIdle));

    assert_eq!(scanner.scan(160), 0);
    assert_eq!(fx.chain.idle_events().len(), 2);
}

#[tokio::test]
async fn run_scans_until_shutdown() -> anyhow::Result<()> {
    let fx = scanner_fixture(20, 5);
    let table = new_session_table();
    let session = fx
        .factory
        .builder(fx.processor.clone(), fx.chain.clone())
        .build();
    table.insert(session.id(), Arc::clone(&session));

    let (tx, rx) = broadcast::channel(1);
    let scanner = IdleScanner::new(table.clone(), Arc::clone(&fx.factory), rx);
    let handle = tokio::spawn(scanner.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.idle_count(IdleStatus::ReaderIdle) >= 1);

    session.close(true);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(table.is_empty());

    tx.send(())?;
    tokio::time::timeout(Duration::from_secs(2), handle).await???;
    Ok(())
}
