//! Speculative scheduling (§4.D.4): each transaction runs against a
//! snapshot on its own task, then waits for every earlier transaction to
//! commit before attempting to merge; a conflicting read set forces one
//! retry against the now-merged state.
//!
//! Grounded on `execute_transaction.cpp`'s `boost::fibers::promise<void>
//! &prev` chain (`"StartStall"` / `"StartRetry"` trace points) and the
//! `alpen-ee/sequencer` handle/task/channel idiom for wiring a pipeline
//! stage's ordering through `tokio::sync` primitives instead of raw
//! fibers.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use monad_primitives::Incarnation;

use crate::evm::EvmCollaborator;
use crate::lifecycle::{run_transaction, LifecycleConfig, TxnOutcome};
use crate::state::{BlockState, StateReader, TxOverlay};
use crate::transaction::Transaction;

/// The outcome of one transaction's slot in the schedule, with its index
/// preserved (§4.D.4 "Observable commit order equals t_0, t_1, ...").
#[derive(Debug)]
pub struct ScheduledOutcome {
    pub index: usize,
    pub outcome: TxnOutcome,
}

/// Runs every transaction in `transactions` concurrently, merging them into
/// `block_state` strictly in order. Returns one [`ScheduledOutcome`] per
/// transaction, in index order.
pub async fn execute_block<S, E>(cfg: LifecycleConfig, transactions: Vec<Transaction>, block_state: Arc<BlockState<S>>, evm: Arc<E>) -> Vec<ScheduledOutcome>
where
    S: StateReader + 'static,
    E: EvmCollaborator + 'static,
{
    let mut prev_rx: Option<oneshot::Receiver<()>> = None;
    let mut handles = Vec::with_capacity(transactions.len());

    for (index, tx) in transactions.into_iter().enumerate() {
        let (commit_tx, commit_rx) = oneshot::channel();
        let cfg = cfg.clone();
        let block_state = block_state.clone();
        let evm = evm.clone();
        let prev = prev_rx.take();

        handles.push(tokio::spawn(async move {
            let outcome = run_one(&cfg, index, &tx, &block_state, evm.as_ref(), prev).await;
            // Release the next fiber's merge attempt regardless of our own
            // outcome: a rejected/errored transaction still "happens
            // before" the next one's commit, it just contributes no writes.
            let _ = commit_tx.send(());
            ScheduledOutcome { index, outcome }
        }));
        prev_rx = Some(commit_rx);
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(scheduled) => results.push(scheduled),
            Err(join_err) => {
                warn!(error = %join_err, "transaction task panicked");
            }
        }
    }
    results
}

async fn run_one<S, E>(cfg: &LifecycleConfig, index: usize, tx: &Transaction, block_state: &Arc<BlockState<S>>, evm: &E, prev: Option<oneshot::Receiver<()>>) -> TxnOutcome
where
    S: StateReader,
    E: EvmCollaborator,
{
    let incarnation = Incarnation::new(cfg.block_number, index as u32 + 1);

    let mut overlay = TxOverlay::new(block_state.clone(), incarnation);
    let outcome = run_transaction(cfg, tx, &mut overlay, evm);

    // Suspension point (b): await the completion promise of the previous
    // transaction in the pipeline (§5 "Suspension points").
    if let Some(prev) = prev {
        let _ = prev.await;
    }

    match outcome {
        TxnOutcome::Executed { .. } if block_state.can_merge(&overlay) => {
            block_state.merge(overlay);
            outcome
        }
        TxnOutcome::Executed { .. } => {
            debug!(index, "read set conflicted with a prior commit, retrying");
            let mut overlay = TxOverlay::new(block_state.clone(), incarnation);
            let retried = run_transaction(cfg, tx, &mut overlay, evm);
            debug_assert!(block_state.can_merge(&overlay), "retry must be conflict-free once serialized after every earlier commit");
            if matches!(retried, TxnOutcome::Executed { .. }) {
                block_state.merge(overlay);
            }
            retried
        }
        other => other,
    }
}
