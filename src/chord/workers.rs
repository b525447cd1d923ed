use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::time::{self, MissedTickBehavior};

use crate::chord::node::Node;

fn ticker(interval: Duration) -> time::Interval {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Periodically repair the successor chain and converge predecessor links.
pub async fn run_stabilize(node: Arc<Node>, interval: Duration) {
    info!("stabilize: running every {}ms", interval.as_millis());
    let mut ticker = ticker(interval);
    loop {
        ticker.tick().await;
        node.stabilize().await;
    }
}

/// Rotate through the finger table, refreshing one slot per tick.
pub async fn run_fix_fingers(node: Arc<Node>, interval: Duration) {
    // Give the ring a moment to settle before the first sweep.
    time::sleep(Duration::from_secs(2)).await;
    info!("fix_fingers: running every {}ms", interval.as_millis());
    let mut ticker = ticker(interval);
    let mut next = 0;
    loop {
        ticker.tick().await;
        next = node.fix_fingers(next).await;
    }
}

/// Probe the predecessor each tick so a dead one is forgotten.
pub async fn run_check_predecessor(node: Arc<Node>, interval: Duration) {
    info!("check_predecessor: running every {}ms", interval.as_millis());
    let mut ticker = ticker(interval);
    loop {
        ticker.tick().await;
        node.check_predecessor().await;
    }
}
