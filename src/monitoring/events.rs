use metrics::{counter, histogram};
use solana_sdk::signature::Signature;
use tracing::{debug, info, warn};

use crate::lander::LanderReceipt;
use crate::rpc::{RpcFailure, SimulationReport};

use super::metrics::prometheus_enabled;

pub fn lander_send(lander: &'static str, endpoint: &str, signature: &Signature, attempt: usize) {
    debug!(
        target: "monitoring::lander",
        event = "send",
        lander,
        endpoint,
        signature = %signature,
        attempt,
        "transaction sent"
    );

    if prometheus_enabled() {
        counter!("lander_send_total", "lander" => lander).increment(1);
        if attempt > 1 {
            counter!("lander_resend_total", "lander" => lander).increment(1);
        }
    }
}

pub fn lander_send_failed(lander: &'static str, attempt: usize, err: &RpcFailure) {
    warn!(
        target: "monitoring::lander",
        event = "send_failed",
        lander,
        attempt,
        error = %err,
        "transaction send failed"
    );

    if prometheus_enabled() {
        counter!("lander_send_failure_total", "lander" => lander).increment(1);
    }
}

pub fn block_height_failed(
    lander: &'static str,
    signature: &Signature,
    consecutive: usize,
    err: &RpcFailure,
) {
    warn!(
        target: "monitoring::lander",
        event = "block_height_failed",
        lander,
        signature = %signature,
        consecutive,
        error = %err,
        "block height read failed, keeping last known height"
    );

    if prometheus_enabled() {
        counter!("lander_block_height_failure_total", "lander" => lander).increment(1);
    }
}

pub fn lander_confirmed(receipt: &LanderReceipt) {
    info!(
        target: "monitoring::lander",
        event = "confirmed",
        lander = receipt.lander,
        endpoint = %receipt.endpoint,
        signature = %receipt.signature,
        slot = receipt.status.slot,
        status = receipt.status.level().as_str(),
        sends = receipt.sends,
        polls = receipt.polls,
        bundle_id = receipt.bundle_id.as_deref().unwrap_or_default(),
        "transaction confirmed"
    );

    if prometheus_enabled() {
        counter!(
            "lander_outcome_total",
            "lander" => receipt.lander,
            "result" => "confirmed"
        )
        .increment(1);
        histogram!("lander_confirm_polls", "lander" => receipt.lander)
            .record(receipt.polls as f64);
        histogram!("lander_confirm_sends", "lander" => receipt.lander)
            .record(receipt.sends as f64);
    }
}

pub fn lander_expired(
    lander: &'static str,
    signature: &Signature,
    last_valid_block_height: u64,
    observed_height: u64,
    sends: usize,
) {
    warn!(
        target: "monitoring::lander",
        event = "expired",
        lander,
        signature = %signature,
        last_valid_block_height,
        observed_height,
        sends,
        "blockhash expired before confirmation"
    );

    if prometheus_enabled() {
        counter!(
            "lander_outcome_total",
            "lander" => lander,
            "result" => "expired"
        )
        .increment(1);
    }
}

pub fn lander_reverted(lander: &'static str, signature: &Signature, err: &str) {
    warn!(
        target: "monitoring::lander",
        event = "reverted",
        lander,
        signature = %signature,
        error = err,
        "transaction landed with execution error"
    );

    if prometheus_enabled() {
        counter!(
            "lander_outcome_total",
            "lander" => lander,
            "result" => "reverted"
        )
        .increment(1);
    }
}

pub fn precheck_failed(lander: &'static str, signature: &Signature, report: &SimulationReport) {
    warn!(
        target: "monitoring::lander",
        event = "precheck_failed",
        lander,
        signature = %signature,
        error = report.err.as_deref().unwrap_or_default(),
        units = ?report.units_consumed,
        logs = report.logs.len(),
        "precheck simulation failed, transaction not sent"
    );

    if prometheus_enabled() {
        counter!("lander_precheck_failure_total", "lander" => lander).increment(1);
    }
}

pub fn relay_bundle_accepted(endpoint: &str, bundle_id: &str, signature: &Signature) {
    info!(
        target: "monitoring::relay",
        event = "bundle_accepted",
        endpoint,
        bundle_id,
        signature = %signature,
        "bundle accepted by relay"
    );

    if prometheus_enabled() {
        counter!("lander_relay_bundle_total", "result" => "accepted").increment(1);
    }
}

pub fn relay_bundle_rejected(endpoint: &str, reason: &str) {
    warn!(
        target: "monitoring::relay",
        event = "bundle_rejected",
        endpoint,
        reason,
        "relay rejected bundle"
    );

    if prometheus_enabled() {
        counter!("lander_relay_bundle_total", "result" => "rejected").increment(1);
    }
}

pub fn simulation_finished(report: &SimulationReport) {
    debug!(
        target: "monitoring::simulate",
        event = "simulated",
        slot = report.context_slot,
        units = ?report.units_consumed,
        success = report.is_success(),
        "simulation finished"
    );

    if prometheus_enabled() {
        let result = if report.is_success() { "ok" } else { "err" };
        counter!("lander_simulation_total", "result" => result).increment(1);
        if let Some(units) = report.units_consumed {
            histogram!("lander_simulation_units").record(units as f64);
        }
    }
}

pub fn submit_failed(kind: &'static str, description: &str) {
    warn!(
        target: "monitoring::engine",
        event = "submit_failed",
        kind,
        description,
        "submission failed"
    );

    if prometheus_enabled() {
        counter!("lander_submit_failure_total", "kind" => kind).increment(1);
    }
}
