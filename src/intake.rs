//! Order-paid intake - newline-delimited JSON events to an [`OrderPaidHandler`]
//!
//! One event per line. Blank lines are ignored; malformed lines and failed
//! events are logged and counted, and the stream keeps going.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::engine::{OrderPaidEvent, OrderPaidHandler};
use crate::reward::DistributionOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeSummary {
    pub received: u64,
    pub distributed: u64,
    /// Seen before; nothing written
    pub duplicates: u64,
    /// No referrer or no payable level
    pub no_rewards: u64,
    pub failed: u64,
    pub malformed: u64,
}

/// Feed every event from `reader` to `handler`, in order
pub async fn run_intake<R, H>(handler: &H, reader: R) -> std::io::Result<IntakeSummary>
where
    R: AsyncBufRead + Unpin,
    H: OrderPaidHandler + ?Sized,
{
    let mut summary = IntakeSummary::default();
    let mut lines = reader.lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: OrderPaidEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Malformed order-paid event skipped");
                summary.malformed += 1;
                continue;
            }
        };
        summary.received += 1;

        match handler.on_order_paid(event).await {
            Ok(report) => match report.distribution {
                DistributionOutcome::Distributed { .. } => summary.distributed += 1,
                DistributionOutcome::AlreadyDistributed => summary.duplicates += 1,
                DistributionOutcome::NoReferrer | DistributionOutcome::NothingToDistribute => {
                    summary.no_rewards += 1
                }
            },
            // already logged by the handler
            Err(_) => summary.failed += 1,
        }
    }

    tracing::info!(
        received = summary.received,
        distributed = summary.distributed,
        duplicates = summary.duplicates,
        no_rewards = summary.no_rewards,
        failed = summary.failed,
        malformed = summary.malformed,
        "Order-paid intake finished"
    );
    Ok(summary)
}
