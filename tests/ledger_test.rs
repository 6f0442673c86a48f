use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use yieldbook::db::init_db;
use yieldbook::domain::{
    ClosureRequest, Decimal, NewCostBasisEntry, NewSnapshot, PositionId, ProtocolModule,
    RewardClaim, RewardSource, TimeMs,
};
use yieldbook::engine::PositionPnl;
use yieldbook::orchestration::{Analytics, PositionSyncItem};
use yieldbook::{Address, Config, LedgerError, PositionLedger, Repository, RewardAttributor, SyncIngestor};

const DAY_MS: i64 = 86_400_000;
const WALLET: &str = "0xabc";

struct Harness {
    ledger: PositionLedger,
    attributor: RewardAttributor,
    analytics: Analytics,
    ingestor: SyncIngestor,
    repo: Arc<Repository>,
    _temp: TempDir,
}

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn days_ago(days: i64) -> TimeMs {
    TimeMs::new(TimeMs::now().as_ms() - days * DAY_MS)
}

async fn setup() -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        max_price_age_secs: 3600,
        low_confidence_days: 7,
        exchange_rates: Default::default(),
    };

    Harness {
        ledger: PositionLedger::new(repo.clone()),
        attributor: RewardAttributor::new(repo.clone()),
        analytics: Analytics::new(repo.clone(), config),
        ingestor: SyncIngestor::new(repo.clone()),
        repo,
        _temp: temp_dir,
    }
}

async fn seed_position(h: &Harness, id: &str) -> PositionId {
    h.ingestor
        .ingest_positions(
            &Address::new(WALLET.to_string()),
            vec![PositionSyncItem {
                position_id: Some(id.to_string()),
                chain_id: "ethereum".to_string(),
                protocol: "uniswap".to_string(),
                protocol_module: ProtocolModule::LiquidityPool,
                vault_address: None,
                token_name: None,
                token_symbol: None,
                balance: d("1"),
                balance_usd: d("800"),
                price_usd: d("800"),
                logo_url: None,
            }],
        )
        .await
        .unwrap();
    PositionId::new(id)
}

fn deposit(total: &str, at: TimeMs) -> NewCostBasisEntry {
    NewCostBasisEntry {
        total_usd: d(total),
        token_a: None,
        token_b: None,
        deposited_at: at,
        tx_hash: None,
        vault_address: None,
    }
}

fn snapshot(balance_usd: &str, at: TimeMs) -> NewSnapshot {
    NewSnapshot {
        balance: d("1"),
        balance_usd: d(balance_usd),
        price_usd: d(balance_usd),
        protocol_apy: None,
        snapshot_date: at,
    }
}

fn close_request(exit_value: &str, at: TimeMs) -> ClosureRequest {
    ClosureRequest {
        exit_date: at,
        exit_value_usd: d(exit_value),
        destination_account_id: "checking".to_string(),
        tx_hash: Some("0xexit".to_string()),
    }
}

#[tokio::test]
async fn test_cost_basis_accumulates_and_is_frozen_by_close() {
    let h = setup().await;
    let id = seed_position(&h, "pos-1").await;

    assert_eq!(h.ledger.cumulative_cost_basis(&id).await.unwrap(), None);

    h.ledger.record_cost_basis(&id, deposit("500", days_ago(10))).await.unwrap();
    h.ledger.record_cost_basis(&id, deposit("300", days_ago(5))).await.unwrap();
    assert_eq!(h.ledger.cumulative_cost_basis(&id).await.unwrap(), Some(d("800")));

    h.ledger
        .close_position(&id, close_request("850", days_ago(1)))
        .await
        .unwrap();

    let err = h
        .ledger
        .record_cost_basis(&id, deposit("200", days_ago(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::PositionClosed(ref p) if *p == id));
    assert_eq!(h.ledger.cumulative_cost_basis(&id).await.unwrap(), Some(d("800")));
}

#[tokio::test]
async fn test_cost_basis_validation() {
    let h = setup().await;
    let id = seed_position(&h, "pos-1").await;

    let err = h.ledger.record_cost_basis(&id, deposit("0", days_ago(1))).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let future = TimeMs::new(TimeMs::now().as_ms() + DAY_MS);
    let err = h.ledger.record_cost_basis(&id, deposit("10", future)).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = h
        .ledger
        .record_cost_basis(&PositionId::new("missing"), deposit("10", days_ago(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn test_reversal_corrects_cost_basis_once() {
    let h = setup().await;
    let id = seed_position(&h, "pos-1").await;

    h.ledger.record_cost_basis(&id, deposit("500", days_ago(10))).await.unwrap();
    let wrong = h.ledger.record_cost_basis(&id, deposit("300", days_ago(5))).await.unwrap();

    let reversal = h.ledger.reverse_cost_basis(&id, wrong.id).await.unwrap();
    assert_eq!(reversal.total_usd, d("-300"));
    assert_eq!(reversal.reverses_entry_id, Some(wrong.id));
    assert_eq!(h.ledger.cumulative_cost_basis(&id).await.unwrap(), Some(d("500")));

    let err = h.ledger.reverse_cost_basis(&id, wrong.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyReversed { entry_id } if entry_id == wrong.id));

    let err = h.ledger.reverse_cost_basis(&id, reversal.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // Entries are append-only: three rows, none edited.
    let entries = h.ledger.list_cost_basis(&id).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].total_usd, d("300"));
}

#[tokio::test]
async fn test_out_of_order_snapshot_rejected() {
    let h = setup().await;
    let id = seed_position(&h, "pos-1").await;

    let t1 = days_ago(2);
    h.ledger.append_snapshot(&id, snapshot("900", t1)).await.unwrap();

    for attempted in [t1, days_ago(3)] {
        let err = h
            .ledger
            .append_snapshot(&id, snapshot("910", attempted))
            .await
            .unwrap_err();
        match err {
            LedgerError::OutOfOrderSnapshot { latest, attempted: a, .. } => {
                assert_eq!(latest, t1);
                assert_eq!(a, attempted);
            }
            other => panic!("expected OutOfOrderSnapshot, got {:?}", other),
        }
    }

    h.ledger.append_snapshot(&id, snapshot("920", days_ago(1))).await.unwrap();
    let latest = h.repo.latest_snapshot(&id).await.unwrap().unwrap();
    assert_eq!(latest.balance_usd, d("920"));
}

#[tokio::test]
async fn test_realized_pnl_matches_unrealized_before_close() {
    let h = setup().await;
    let id = seed_position(&h, "pos-1").await;

    h.ledger.record_cost_basis(&id, deposit("500", days_ago(30))).await.unwrap();
    h.ledger.record_cost_basis(&id, deposit("300", days_ago(20))).await.unwrap();

    h.ingestor
        .ingest_reward_claims(vec![RewardClaim {
            wallet_address: WALLET.to_string(),
            chain_id: "ethereum".to_string(),
            tx_hash: Some("0xclaim".to_string()),
            token_address: "0xop".to_string(),
            token_symbol: Some("OP".to_string()),
            token_amount: d("10"),
            fiat_value: d("20"),
            block_timestamp: days_ago(3).as_ms() / 1000,
            source: RewardSource::Merkl,
        }])
        .await
        .unwrap();
    let reward = h
        .repo
        .list_wallet_rewards(&Address::new(WALLET.to_string()), true)
        .await
        .unwrap()
        .remove(0);
    h.attributor.attribute(reward.id, &id).await.unwrap();

    let snap_date = days_ago(2);
    h.ledger.append_snapshot(&id, snapshot("900", snap_date)).await.unwrap();

    let before: PositionPnl = h.analytics.pnl(&id).await.unwrap();
    assert_eq!(before.unrealized_pnl_usd, Some(d("120")));

    let closure = h
        .ledger
        .close_position(&id, close_request("900", days_ago(1)))
        .await
        .unwrap();
    assert_eq!(closure.realized_pnl_usd, before.unrealized_pnl_usd);
    assert_eq!(closure.realized_pnl_pct, Some(d("15")));

    let exit_tx = h.repo.get_transaction(&closure.transaction_id).await.unwrap().unwrap();
    assert_eq!(exit_tx.amount_usd, d("900"));
    assert_eq!(exit_tx.account_id.as_deref(), Some("checking"));

    let after = h.analytics.pnl(&id).await.unwrap();
    assert!(after.is_closed);
    assert_eq!(after.realized_pnl_usd, Some(d("120")));
    assert_eq!(after.unrealized_pnl_usd, None);
}

#[tokio::test]
async fn test_close_is_a_single_terminal_transition() {
    let h = setup().await;
    let id = seed_position(&h, "pos-1").await;
    h.ledger.record_cost_basis(&id, deposit("800", days_ago(10))).await.unwrap();

    let (a, b) = tokio::join!(
        h.ledger.close_position(&id, close_request("850", days_ago(1))),
        h.ledger.close_position(&id, close_request("700", days_ago(1))),
    );
    let (winner, loser) = match (a, b) {
        (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
        other => panic!("expected exactly one successful close, got {:?}", other),
    };
    match loser {
        LedgerError::AlreadyClosed(original) => assert_eq!(*original, winner),
        other => panic!("expected AlreadyClosed, got {:?}", other),
    }

    let err = h
        .ledger
        .close_position(&id, close_request("1", days_ago(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyClosed(ref c) if c.exit_value_usd == winner.exit_value_usd));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_freezes_the_cost_basis_it_raced_with() {
    let h = setup().await;

    for i in 0..30 {
        let id = seed_position(&h, &format!("pos-{}", i)).await;
        h.ledger.record_cost_basis(&id, deposit("500", days_ago(10))).await.unwrap();

        let recorder = h.ledger.clone();
        let record_id = id.clone();
        let record = tokio::spawn(async move {
            recorder.record_cost_basis(&record_id, deposit("300", days_ago(5))).await
        });
        let closer = h.ledger.clone();
        let close_id = id.clone();
        let close = tokio::spawn(async move {
            closer.close_position(&close_id, close_request("900", days_ago(1))).await
        });

        let recorded = record.await.unwrap();
        let closure = close.await.unwrap().unwrap();

        let ledger_basis = h.ledger.cumulative_cost_basis(&id).await.unwrap();
        assert_eq!(closure.cost_basis_usd, ledger_basis, "round {}", i);
        match recorded {
            Ok(_) => {
                assert_eq!(closure.cost_basis_usd, Some(d("800")), "round {}", i);
                assert_eq!(closure.realized_pnl_usd, Some(d("100")), "round {}", i);
            }
            Err(LedgerError::PositionClosed(_)) => {
                assert_eq!(closure.cost_basis_usd, Some(d("500")), "round {}", i);
                assert_eq!(closure.realized_pnl_usd, Some(d("400")), "round {}", i);
            }
            Err(other) => panic!("round {}: unexpected {:?}", i, other),
        }
    }
}

#[tokio::test]
async fn test_close_validation() {
    let h = setup().await;
    let id = seed_position(&h, "pos-1").await;
    h.ledger.record_cost_basis(&id, deposit("800", days_ago(10))).await.unwrap();

    let err = h
        .ledger
        .close_position(&id, close_request("-1", days_ago(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = h
        .ledger
        .close_position(&id, close_request("100", days_ago(11)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // Zero exit value is a legitimate total loss.
    let closure = h
        .ledger
        .close_position(&id, close_request("0", days_ago(1)))
        .await
        .unwrap();
    assert_eq!(closure.realized_pnl_usd, Some(d("-800")));
    assert_eq!(closure.realized_pnl_pct, Some(d("-100")));
}

#[tokio::test]
async fn test_close_without_cost_basis_has_unknown_pnl() {
    let h = setup().await;
    let id = seed_position(&h, "pos-1").await;

    let closure = h
        .ledger
        .close_position(&id, close_request("100", days_ago(1)))
        .await
        .unwrap();
    assert_eq!(closure.cost_basis_usd, None);
    assert_eq!(closure.realized_pnl_usd, None);
    assert_eq!(closure.realized_pnl_pct, None);
}

#[tokio::test]
async fn test_resync_does_not_reopen_closed_position() {
    let h = setup().await;
    let id = seed_position(&h, "pos-1").await;
    h.ledger
        .close_position(&id, close_request("100", days_ago(1)))
        .await
        .unwrap();

    seed_position(&h, "pos-1").await;

    assert!(h.repo.get_closure(&id).await.unwrap().is_some());
    assert!(h.analytics.pnl(&id).await.unwrap().is_closed);
}
