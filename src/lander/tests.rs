use std::sync::Arc;

use reqwest::Client;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::VersionedMessage;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;

use crate::config::{BroadcastMode, LanderConfig, SingleShotConfig, SpamConfig};
use crate::rpc::{BlockhashSnapshot, ConfirmationStatus, RpcFailure, SimulationReport};
use crate::test_support::{FakeLedger, FakeRelay, failed_status, status};

use super::*;

fn config(mode: BroadcastMode) -> LanderConfig {
    LanderConfig {
        mode,
        spam: SpamConfig {
            resend_interval_ms: 0,
            poll_interval_ms: 0,
            poll_attempts: 5,
            precheck: false,
        },
        ..LanderConfig::default()
    }
}

fn lander(ledger: &Arc<FakeLedger>, config: &LanderConfig) -> LanderVariant {
    LanderFactory::new(ledger.clone(), None, Client::new())
        .build_with_relay(config, None)
        .expect("lander")
}

fn relay_lander(
    ledger: &Arc<FakeLedger>,
    relay: &Arc<FakeRelay>,
    config: &LanderConfig,
) -> LanderVariant {
    LanderFactory::new(ledger.clone(), None, Client::new())
        .build_with_relay(config, Some(relay.clone()))
        .expect("relay lander")
}

fn signed_transaction(snapshot: &BlockhashSnapshot) -> VersionedTransaction {
    let payer = Keypair::new();
    let ix = Instruction {
        program_id: Pubkey::new_unique(),
        accounts: Vec::new(),
        data: vec![1, 2, 3],
    };
    let message =
        V0Message::try_compile(&payer.pubkey(), &[ix], &[], snapshot.blockhash).expect("compile");
    VersionedTransaction::try_new(VersionedMessage::V0(message), &[&payer]).expect("sign")
}

#[tokio::test]
async fn spam_confirms_on_first_send() {
    let ledger = FakeLedger::new(100);
    ledger.land_on_send(status(ConfirmationStatus::Finalized));
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let receipt = lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .expect("landed");

    assert_eq!(receipt.lander, "spam");
    assert_eq!(receipt.signature, tx.signatures[0]);
    assert_eq!(receipt.status.level(), ConfirmationStatus::Finalized);
    assert_eq!(receipt.sends, 1);
    assert_eq!(ledger.sends(), 1);
    assert_eq!(ledger.polls(), 1);
}

#[tokio::test]
async fn spam_polls_until_finalized_without_resending() {
    let ledger = FakeLedger::new(100);
    let processed = Some(status(ConfirmationStatus::Processed));
    ledger.script_statuses(vec![processed; 4]);
    ledger.script_statuses([Some(status(ConfirmationStatus::Finalized))]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let receipt = lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .expect("landed");

    assert_eq!(ledger.sends(), 1);
    assert_eq!(ledger.polls(), 5);
    assert_eq!(receipt.polls, 5);
    assert_eq!(receipt.status.level(), ConfirmationStatus::Finalized);
}

#[tokio::test]
async fn spam_times_out_after_block_height_passes_expiry() {
    let ledger = FakeLedger::new(100);
    ledger.script_heights([100, 100, 120, 151]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let err = lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .unwrap_err();

    match err {
        LanderError::Expired {
            signature,
            last_valid_block_height,
            observed_height,
        } => {
            assert_eq!(signature, tx.signatures[0]);
            assert_eq!(last_valid_block_height, snapshot.last_valid_block_height);
            assert_eq!(observed_height, 151);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ledger.sends(), 3);
    assert_eq!(ledger.polls(), 15);
}

#[tokio::test]
async fn status_is_checked_before_expiry() {
    // 第五次轮询看到确认时区块高度已越过有效期，仍判定成功。
    let ledger = FakeLedger::new(150);
    ledger.script_heights([150, 151]);
    let processed = Some(status(ConfirmationStatus::Processed));
    ledger.script_statuses(vec![processed; 4]);
    ledger.script_statuses([Some(status(ConfirmationStatus::Finalized))]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let receipt = lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .expect("confirmation observed before expiry check");

    assert_eq!(receipt.sends, 1);
    assert_eq!(ledger.height_calls(), 1);
}

#[tokio::test]
async fn expiry_wins_once_the_poll_round_is_exhausted() {
    let ledger = FakeLedger::new(150);
    ledger.script_heights([150, 151]);
    let processed = Some(status(ConfirmationStatus::Processed));
    ledger.script_statuses(vec![processed; 5]);
    ledger.script_statuses([Some(status(ConfirmationStatus::Finalized))]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let err = lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .unwrap_err();

    assert!(matches!(err, LanderError::Expired { .. }));
    assert_eq!(ledger.sends(), 1);
    assert_eq!(ledger.polls(), 5);
}

#[tokio::test]
async fn looser_target_returns_on_processed() {
    let ledger = FakeLedger::new(100);
    ledger.land_on_send(status(ConfirmationStatus::Processed));
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);
    let spam = lander(&ledger, &config(BroadcastMode::Spam));

    let receipt = spam
        .land(&tx, &snapshot, CommitmentTarget::ProcessedOrBetter)
        .await
        .expect("processed is enough");
    assert_eq!(receipt.status.level(), ConfirmationStatus::Processed);
    assert_eq!(ledger.polls(), 1);
}

#[tokio::test]
async fn resending_does_not_change_outcome() {
    let outcome = |poll_attempts: usize| async move {
        let ledger = FakeLedger::new(100);
        ledger.land_on_send(status(ConfirmationStatus::Finalized));
        // 前 12 次查询节点尚未看到交易，迫使循环重发两次
        ledger.script_statuses(vec![None; 12]);
        let snapshot = ledger.snapshot();
        let tx = signed_transaction(&snapshot);
        let mut cfg = config(BroadcastMode::Spam);
        cfg.spam.poll_attempts = poll_attempts;

        let receipt = lander(&ledger, &cfg)
            .land(&tx, &snapshot, CommitmentTarget::Finalized)
            .await
            .expect("landed");
        assert_eq!(ledger.processed_count(&tx.signatures[0]), 1);
        (receipt.status, ledger.sends())
    };

    let (once_status, once_sends) = outcome(13).await;
    let (spam_status, spam_sends) = outcome(5).await;
    assert_eq!(once_sends, 1);
    assert_eq!(spam_sends, 3);
    assert_eq!(once_status, spam_status);
}

#[tokio::test]
async fn landed_with_error_is_reverted() {
    let ledger = FakeLedger::new(100);
    ledger.land_on_send(failed_status(
        "{\"InstructionError\":[0,{\"Custom\":6001}]}",
    ));
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let err = lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .unwrap_err();
    match err {
        LanderError::Reverted { signature, err } => {
            assert_eq!(signature, tx.signatures[0]);
            assert!(err.contains("6001"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_on_send_is_retried() {
    let ledger = FakeLedger::new(100);
    ledger.fail_sends([RpcFailure::transport("connection reset")]);
    ledger.land_on_send(status(ConfirmationStatus::Finalized));
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let receipt = lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .expect("landed after resend");
    assert_eq!(receipt.sends, 2);
    assert_eq!(ledger.sends(), 2);
}

#[tokio::test]
async fn first_send_rejection_fails_fast() {
    let ledger = FakeLedger::new(100);
    ledger.fail_sends([RpcFailure::Rejected {
        code: -32002,
        message: "Blockhash not found".to_string(),
        preflight: None,
    }]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let err = lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .unwrap_err();
    assert!(matches!(err, LanderError::Rpc(RpcFailure::Rejected { .. })));
    assert_eq!(ledger.polls(), 0);
}

#[tokio::test]
async fn duplicate_rejection_is_not_a_failure() {
    let ledger = FakeLedger::new(100);
    ledger.reject_duplicates();
    ledger.land_on_send(status(ConfirmationStatus::Finalized));
    ledger.script_statuses(vec![None; 5]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let receipt = lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .expect("landed");
    assert_eq!(receipt.sends, 2);
    assert_eq!(ledger.processed_count(&tx.signatures[0]), 1);
}

#[tokio::test]
async fn precheck_failure_skips_sending() {
    let ledger = FakeLedger::new(100);
    ledger.set_simulation(SimulationReport {
        err: Some("{\"InstructionError\":[0,{\"Custom\":1}]}".to_string()),
        logs: vec!["Program log: Error: insufficient funds".to_string()],
        ..SimulationReport::default()
    });
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);
    let mut cfg = config(BroadcastMode::Spam);
    cfg.spam.precheck = true;

    let err = lander(&ledger, &cfg)
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .unwrap_err();
    match err {
        LanderError::PrecheckFailed(report) => assert_eq!(report.logs.len(), 1),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ledger.simulations(), 1);
    assert_eq!(ledger.sends(), 0);
    let simulated = ledger.simulated();
    assert!(simulated[0].sig_verify);
    assert_eq!(simulated[0].min_context_slot, Some(snapshot.min_context_slot()));
}

#[tokio::test]
async fn spam_disables_node_retries() {
    let ledger = FakeLedger::new(100);
    ledger.land_on_send(status(ConfirmationStatus::Finalized));
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    lander(&ledger, &config(BroadcastMode::Spam))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .expect("landed");

    let sent = ledger.sent();
    let (sent_tx, options) = &sent[0];
    assert_eq!(sent_tx, &tx);
    assert!(options.skip_preflight);
    assert_eq!(options.max_retries, Some(0));
    assert_eq!(options.min_context_slot, Some(snapshot.min_context_slot()));
}

#[tokio::test]
async fn single_shot_sends_once_and_watches() {
    let ledger = FakeLedger::new(100);
    ledger.script_heights([100, 100, 151]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);
    let mut cfg = config(BroadcastMode::SingleShot);
    cfg.single_shot = SingleShotConfig {
        max_retries: Some(7),
        skip_preflight: false,
    };

    let err = lander(&ledger, &cfg)
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .unwrap_err();

    assert!(matches!(err, LanderError::Expired { .. }));
    assert_eq!(ledger.sends(), 1);
    assert_eq!(ledger.polls(), 10);
    let (_, options) = &ledger.sent()[0];
    assert!(!options.skip_preflight);
    assert_eq!(options.max_retries, Some(7));
}

#[tokio::test]
async fn block_height_failure_after_send_keeps_polling() {
    let ledger = FakeLedger::new(100);
    ledger.land_on_send(status(ConfirmationStatus::Finalized));
    ledger.script_statuses(vec![None; 5]);
    ledger.fail_height_calls([2]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let receipt = lander(&ledger, &config(BroadcastMode::SingleShot))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .expect("landed");
    assert_eq!(receipt.sends, 1);
    assert_eq!(receipt.polls, 6);
    assert_eq!(receipt.status.level(), ConfirmationStatus::Finalized);
    assert_eq!(ledger.height_calls(), 2);
}

#[tokio::test]
async fn repeated_block_height_failures_give_up() {
    let ledger = FakeLedger::new(100);
    ledger.fail_height_calls(2..=1 + MAX_HEIGHT_FAILURES);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let err = lander(&ledger, &config(BroadcastMode::SingleShot))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .unwrap_err();
    assert!(matches!(err, LanderError::Unavailable(RpcFailure::Transport(_))));
    assert_eq!(ledger.sends(), 1);
    assert_eq!(ledger.height_calls(), 1 + MAX_HEIGHT_FAILURES);
}

#[tokio::test]
async fn block_height_failures_reset_after_success() {
    let ledger = FakeLedger::new(100);
    ledger.fail_height_calls([2, 3, 5, 6, 7]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let err = lander(&ledger, &config(BroadcastMode::SingleShot))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .unwrap_err();
    assert!(matches!(err, LanderError::Unavailable(_)));
    assert_eq!(ledger.height_calls(), 7);
}

#[tokio::test]
async fn single_shot_preflight_rejection_is_returned() {
    let ledger = FakeLedger::new(100);
    ledger.fail_sends([RpcFailure::Rejected {
        code: -32002,
        message: "Transaction simulation failed".to_string(),
        preflight: None,
    }]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let err = lander(&ledger, &config(BroadcastMode::SingleShot))
        .land(&tx, &snapshot, CommitmentTarget::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, LanderError::Rpc(_)));
    assert_eq!(ledger.sends(), 1);
}

#[tokio::test]
async fn relay_status_confirms_bundle() {
    let ledger = FakeLedger::new(100);
    let relay = FakeRelay::accepting();
    relay.script_statuses([
        None,
        Some(BundleStatus {
            slot: 1_010,
            confirmation_status: Some(ConfirmationStatus::Finalized),
            err: None,
            transactions: Vec::new(),
        }),
    ]);
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let receipt = relay_lander(&ledger, &relay, &config(BroadcastMode::Relay))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .expect("landed via relay");

    assert_eq!(receipt.lander, "relay");
    assert_eq!(receipt.bundle_id.as_deref(), Some("bundle-1"));
    assert_eq!(receipt.status.slot, 1_010);
    assert_eq!(relay.bundles().len(), 1);
    assert_eq!(relay.status_calls(), 2);
    assert_eq!(ledger.sends(), 1);
}

#[tokio::test]
async fn relay_rejection_falls_back_to_resend_loop() {
    let ledger = FakeLedger::new(100);
    ledger.land_on_send(status(ConfirmationStatus::Finalized));
    let relay = FakeRelay::rejecting();
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let receipt = relay_lander(&ledger, &relay, &config(BroadcastMode::Relay))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .expect("landed via primary network");

    assert_eq!(receipt.bundle_id, None);
    assert_eq!(relay.status_calls(), 0);
}

#[tokio::test]
async fn relay_expiry_is_not_confirmed() {
    let ledger = FakeLedger::new(100);
    ledger.script_heights([100, 151]);
    let relay = FakeRelay::accepting();
    let snapshot = ledger.snapshot();
    let tx = signed_transaction(&snapshot);

    let err = relay_lander(&ledger, &relay, &config(BroadcastMode::Relay))
        .land(&tx, &snapshot, CommitmentTarget::Finalized)
        .await
        .unwrap_err();

    match err {
        LanderError::NotConfirmed {
            signature,
            bundle_id,
        } => {
            assert_eq!(signature, tx.signatures[0]);
            assert_eq!(bundle_id.as_deref(), Some("bundle-1"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn relay_mode_requires_endpoints() {
    let ledger = FakeLedger::new(100);
    let result = LanderFactory::new(ledger, None, Client::new()).build(&config(BroadcastMode::Relay));
    assert!(matches!(result, Err(LanderError::Fatal(_))));
}
