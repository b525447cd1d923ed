use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};
use tokio::fs;

use crate::chord::id::{between, jump, Id};
use crate::chord::{KEY_SIZE, MAX_LOOKUP_STEPS};
use crate::error::{ChordError, NetworkError};
use crate::network::grpc::client::ChordGrpcClient;

/// Snapshot of the neighborhood a peer hands back from GetPredecessor.
#[derive(Debug, Clone, Default)]
pub struct PredecessorView {
    pub predecessor: Option<String>,
    pub successors: Vec<String>,
}

/// Outcome of resolving one key across the ring.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub key: Id,
    pub address: String,
    pub value: Option<Vec<u8>>,
}

struct RingState {
    predecessor: Option<String>,
    successors: Vec<String>,
    // Slot k holds the successor of jump(self, k); slot 0 is unused.
    fingers: Vec<Option<String>>,
    bucket: HashMap<String, Vec<u8>>,
}

/// One ring member. All mutable state sits behind a single reader-writer
/// lock, which is never held across an outbound call: every operation
/// snapshots under read mode, releases, talks to peers, then re-acquires
/// write mode to apply the result.
pub struct Node {
    address: String,
    id: Id,
    successor_list_size: usize,
    state: RwLock<RingState>,
}

impl Node {
    pub fn new(address: String, successor_list_size: usize) -> Self {
        let id = Id::of(&address);
        Node {
            address,
            id,
            successor_list_size,
            state: RwLock::new(RingState {
                predecessor: None,
                successors: Vec::new(),
                fingers: vec![None; KEY_SIZE + 1],
                bucket: HashMap::new(),
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn id(&self) -> Id {
        self.id
    }

    fn read(&self) -> RwLockReadGuard<'_, RingState> {
        self.state.read().expect("node state lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, RingState> {
        self.state.write().expect("node state lock poisoned")
    }

    /// First node of a fresh ring: its own successor, no predecessor.
    pub fn create(&self) {
        let mut state = self.write();
        state.predecessor = None;
        state.successors = vec![self.address.clone()];
    }

    /// Join an existing ring through `bootstrap`. The optional target is a
    /// placement hint only; the node's identity stays hash(address).
    pub async fn join(&self, bootstrap: &str, target: Option<Id>) -> Result<(), ChordError> {
        let target = target.unwrap_or(self.id);
        let successor = ChordGrpcClient::connect(bootstrap)
            .await
            .map_err(|e| ChordError::JoinFailed(e.to_string()))?
            .find_successor(target, 0)
            .await
            .map_err(|e| ChordError::JoinFailed(e.to_string()))?;

        {
            let mut state = self.write();
            state.predecessor = None;
            state.successors = vec![successor.clone()];
        }

        Self::notify_peer(&successor, &self.address)
            .await
            .map_err(|e| ChordError::JoinFailed(e.to_string()))?;

        info!("join: joined the ring via {bootstrap}, successor is {successor}");
        Ok(())
    }

    /// Resolve the node responsible for `target`. `steps` counts the
    /// delegations already taken on this lookup chain; past the limit the
    /// lookup fails rather than delegate again.
    pub async fn find_successor(&self, target: Id, steps: u32) -> Result<String, ChordError> {
        let successor = {
            let state = self.read();
            state.successors.first().cloned()
        };
        let successor = match successor {
            None => return Ok(self.address.clone()),
            Some(s) if s == self.address => return Ok(self.address.clone()),
            Some(s) => s,
        };

        if between(self.id, target, Id::of(&successor), true) {
            return Ok(successor);
        }

        if steps >= MAX_LOOKUP_STEPS {
            return Err(ChordError::LookupStepsExceeded);
        }

        let next = self
            .closest_preceding_finger(target)
            .unwrap_or(successor);
        if next == self.address {
            return Ok(self.address.clone());
        }

        let address = ChordGrpcClient::connect(&next)
            .await?
            .find_successor(target, steps + 1)
            .await?;
        Ok(address)
    }

    /// Closest finger strictly between this node and the target, scanning
    /// the table top-down.
    pub fn closest_preceding_finger(&self, target: Id) -> Option<String> {
        let state = self.read();
        for k in (1..=KEY_SIZE).rev() {
            if let Some(finger) = &state.fingers[k] {
                if between(self.id, Id::of(finger), target, false) {
                    return Some(finger.clone());
                }
            }
        }
        None
    }

    /// One round of successor repair: find the first live successor, adopt
    /// any node that has slipped in between, splice its list onto ours, and
    /// announce ourselves to it.
    pub async fn stabilize(&self) {
        let (successor, predecessor) = {
            let state = self.read();
            (state.successors.first().cloned(), state.predecessor.clone())
        };
        let Some(mut successor) = successor else {
            self.write().successors = vec![self.address.clone()];
            return;
        };

        if successor == self.address {
            // Alone in our own chain; pull the predecessor in if it is
            // still answering.
            if let Some(pred) = predecessor {
                match Self::notify_peer(&pred, &self.address).await {
                    Ok(()) => {
                        let mut list = vec![pred, self.address.clone()];
                        list.truncate(self.successor_list_size);
                        self.write().successors = list;
                    }
                    Err(err) => {
                        debug!("stabilize: predecessor {pred} is dead, clearing it: {err}");
                        self.write().predecessor = None;
                    }
                }
            }
            return;
        }

        // Walk the list until a successor answers, dropping the dead.
        let mut view = loop {
            match Self::fetch_predecessor_view(&successor).await {
                Ok(view) => break view,
                Err(err) => {
                    warn!("stabilize: dropping dead successor {successor}: {err}");
                    let next = {
                        let mut state = self.write();
                        if let Some(pos) = state.successors.iter().position(|a| a == &successor) {
                            state.successors.remove(pos);
                        }
                        if state.successors.is_empty() {
                            state.successors = vec![self.address.clone()];
                            None
                        } else {
                            Some(state.successors[0].clone())
                        }
                    };
                    match next {
                        Some(next) if next != self.address => successor = next,
                        _ => return,
                    }
                }
            }
        };

        // Standard Chord: a node sitting in (self, successor) becomes the
        // new candidate, re-queried for its own list. The cap keeps a
        // misbehaving chain of claims from walking forever.
        let mut adoptions = 0;
        while adoptions < self.successor_list_size {
            let Some(p) = view.predecessor.clone() else {
                break;
            };
            if p == self.address || p == successor {
                break;
            }
            if !between(self.id, Id::of(&p), Id::of(&successor), false) {
                break;
            }
            match Self::fetch_predecessor_view(&p).await {
                Ok(v) => {
                    debug!("stabilize: adopting closer successor {p}");
                    successor = p;
                    view = v;
                    adoptions += 1;
                }
                Err(err) => {
                    debug!("stabilize: candidate successor {p} unreachable: {err}");
                    break;
                }
            }
        }

        let spliced = splice_successors(
            &successor,
            &view.successors,
            &self.address,
            self.successor_list_size,
        );
        self.write().successors = spliced;

        if let Err(err) = Self::notify_peer(&successor, &self.address).await {
            debug!("stabilize: notify {successor} failed: {err}");
        }
    }

    /// Refresh one finger slot; returns the slot to fix on the next tick.
    /// A failed lookup retreats by one so the slot is retried.
    pub async fn fix_fingers(&self, next: usize) -> usize {
        let next = (next % KEY_SIZE) + 1;
        let target = jump(&self.address, next);
        match self.find_successor(target, 0).await {
            Ok(address) => {
                self.write().fingers[next] = Some(address);
                next
            }
            Err(err) => {
                debug!("fix_fingers: lookup for finger {next} failed: {err}");
                next - 1
            }
        }
    }

    /// Ping the predecessor; a dead one is simply forgotten and the ring
    /// re-learns it through a successor's notify.
    pub async fn check_predecessor(&self) {
        let predecessor = self.read().predecessor.clone();
        let Some(pred) = predecessor else { return };
        if let Err(err) = Self::ping_peer(&pred).await {
            warn!("check_predecessor: {pred} unreachable, clearing: {err}");
            self.write().predecessor = None;
        }
    }

    /// Notify handler: adopt `claimant` as predecessor when none is known
    /// or it lies in (predecessor, self). Returns whether the link changed.
    pub fn apply_notify(&self, claimant: &str) -> bool {
        if claimant.is_empty() || claimant == self.address {
            return false;
        }
        let mut state = self.write();
        let accept = match &state.predecessor {
            None => true,
            Some(current) => between(Id::of(current), Id::of(claimant), self.id, false),
        };
        if accept {
            info!(
                "notify: updating predecessor from {} to {claimant}",
                state.predecessor.as_deref().unwrap_or("(empty)")
            );
            state.predecessor = Some(claimant.to_string());
        }
        accept
    }

    pub fn put(&self, key: String, value: Vec<u8>) {
        self.write().bucket.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.read().bucket.get(key).cloned()
    }

    pub fn delete(&self, key: &str) {
        self.write().bucket.remove(key);
    }

    pub fn bucket_snapshot(&self) -> HashMap<String, Vec<u8>> {
        self.read().bucket.clone()
    }

    pub fn predecessor_view(&self) -> PredecessorView {
        let state = self.read();
        PredecessorView {
            predecessor: state.predecessor.clone(),
            successors: state.successors.clone(),
        }
    }

    /// Resolve the node responsible for `filename` and fetch its value.
    /// An empty answer is a miss, not an error.
    pub async fn lookup(&self, filename: &str) -> Result<LookupResult, ChordError> {
        let key = Id::of(filename);
        let address = match self.closest_preceding_finger(key) {
            Some(start) if start != self.address => {
                ChordGrpcClient::connect(&start)
                    .await?
                    .find_successor(key, 0)
                    .await?
            }
            _ => self.find_successor(key, 0).await?,
        };
        let value = ChordGrpcClient::connect(&address).await?.get(filename).await?;
        Ok(LookupResult { key, address, value })
    }

    /// Read a local file, place it at the responsible node, and copy it to
    /// that node's successors. Replica failures are tolerated; the primary
    /// write decides the outcome.
    pub async fn store_file(&self, path: &str) -> Result<String, ChordError> {
        let data = fs::read(path).await?;
        let filename = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ChordError::InvalidPath(path.to_string()))?
            .to_string();

        let target = self.lookup(&filename).await?.address;
        ChordGrpcClient::connect(&target)
            .await?
            .put(&filename, data.clone())
            .await?;

        let view = Self::fetch_predecessor_view(&target).await.map_err(ChordError::from)?;
        for replica in &view.successors {
            if replica.is_empty() || replica == &target {
                continue;
            }
            match ChordGrpcClient::connect(replica).await {
                Ok(mut client) => {
                    if let Err(err) = client.put(&filename, data.clone()).await {
                        warn!("store_file: replica write to {replica} failed: {err}");
                    }
                }
                Err(err) => warn!("store_file: replica {replica} unreachable: {err}"),
            }
        }
        Ok(target)
    }

    /// Human-readable snapshot: neighborhood, finger table with runs of
    /// equal entries collapsed, and bucket contents.
    pub fn dump(&self) -> String {
        let state = self.read();
        let mut out = String::new();
        let _ = writeln!(out);
        let _ = writeln!(out, "Dump: information about this node");
        let _ = writeln!(out, "Neighborhood");
        let _ = writeln!(out, "pred:    {}", fmt_endpoint(state.predecessor.as_deref()));
        let _ = writeln!(out, "self:    {}", fmt_endpoint(Some(self.address.as_str())));
        for (i, succ) in state.successors.iter().enumerate() {
            let _ = writeln!(out, "succ  {i}: {}", fmt_endpoint(Some(succ.as_str())));
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Finger table");
        let mut k = 1;
        while k <= KEY_SIZE {
            while k < KEY_SIZE && state.fingers[k] == state.fingers[k + 1] {
                k += 1;
            }
            let _ = writeln!(out, " [{k:3}]: {}", fmt_endpoint(state.fingers[k].as_deref()));
            k += 1;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Data items");
        for (key, value) in &state.bucket {
            let _ = writeln!(
                out,
                "    {}.. {} => {}",
                &Id::of(key).to_hex()[..8],
                key,
                String::from_utf8_lossy(value)
            );
        }
        out
    }

    async fn fetch_predecessor_view(address: &str) -> Result<PredecessorView, NetworkError> {
        ChordGrpcClient::connect(address).await?.get_predecessor().await
    }

    async fn notify_peer(address: &str, claimant: &str) -> Result<(), NetworkError> {
        ChordGrpcClient::connect(address).await?.notify(claimant).await
    }

    async fn ping_peer(address: &str) -> Result<(), NetworkError> {
        ChordGrpcClient::connect(address).await?.ping().await
    }
}

/// Rebuild a successor list from a live successor and the list it
/// reported: `[successor] ++ reported`, cut just past the first occurrence
/// of `local`, capped at `limit`.
fn splice_successors(successor: &str, reported: &[String], local: &str, limit: usize) -> Vec<String> {
    let mut list = vec![successor.to_string()];
    for addr in reported {
        if addr.is_empty() {
            continue;
        }
        list.push(addr.clone());
        if addr == local {
            break;
        }
    }
    list.truncate(limit);
    list
}

fn fmt_endpoint(address: Option<&str>) -> String {
    match address {
        None | Some("") => "(empty)".to_string(),
        Some(addr) => format!("{}.. ({addr})", &Id::of(addr).to_hex()[..8]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Identifier order of the fixture addresses, by SHA-1:
    //   "foo" 0beec7b5.. < "bar" 62cdb702.. < "abc" a9993e36.. < "baz" bbe960a2..
    fn node(address: &str) -> Node {
        let n = Node::new(address.to_string(), 4);
        n.create();
        n
    }

    #[test]
    fn bucket_round_trip_and_idempotence() {
        let n = node("baz");
        assert_eq!(n.get("k"), None);

        n.put("k".into(), b"v1".to_vec());
        assert_eq!(n.get("k").as_deref(), Some(&b"v1"[..]));

        // Last writer wins; a repeated write changes nothing further.
        n.put("k".into(), b"v2".to_vec());
        n.put("k".into(), b"v2".to_vec());
        assert_eq!(n.get("k").as_deref(), Some(&b"v2"[..]));

        n.delete("k");
        n.delete("k");
        assert_eq!(n.get("k"), None);
    }

    #[test]
    fn bucket_snapshot_is_a_copy() {
        let n = node("baz");
        n.put("a".into(), b"1".to_vec());
        let snapshot = n.bucket_snapshot();
        n.put("b".into(), b"2".to_vec());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(n.bucket_snapshot().len(), 2);
    }

    #[test]
    fn create_seeds_single_node_ring() {
        let n = node("baz");
        let view = n.predecessor_view();
        assert_eq!(view.predecessor, None);
        assert_eq!(view.successors, vec!["baz".to_string()]);
    }

    #[test]
    fn notify_fills_an_empty_predecessor() {
        let n = node("baz");
        assert!(n.apply_notify("foo"));
        assert_eq!(n.predecessor_view().predecessor.as_deref(), Some("foo"));
    }

    #[test]
    fn notify_gate_rejects_out_of_range_claimants() {
        let n = node("baz");
        assert!(n.apply_notify("bar"));
        // "foo" hashes before "bar", so it is not in (bar, baz).
        assert!(!n.apply_notify("foo"));
        assert_eq!(n.predecessor_view().predecessor.as_deref(), Some("bar"));
    }

    #[test]
    fn notify_race_converges_on_the_closer_claimant() {
        let n = node("baz");
        assert!(n.apply_notify("foo"));
        // "bar" lies in (foo, baz): it wins.
        assert!(n.apply_notify("bar"));
        assert!(!n.apply_notify("foo"));
        assert_eq!(n.predecessor_view().predecessor.as_deref(), Some("bar"));
    }

    #[test]
    fn notify_ignores_self_and_empty_claims() {
        let n = node("baz");
        assert!(!n.apply_notify(""));
        assert!(!n.apply_notify("baz"));
        assert_eq!(n.predecessor_view().predecessor, None);
    }

    #[test]
    fn notify_is_idempotent() {
        let n = node("baz");
        assert!(n.apply_notify("bar"));
        assert!(!n.apply_notify("bar"));
        assert_eq!(n.predecessor_view().predecessor.as_deref(), Some("bar"));
    }

    #[test]
    fn closest_preceding_finger_scans_top_down() {
        let n = node("foo");
        {
            let mut state = n.state.write().unwrap();
            state.fingers[20] = Some("bar".to_string());
            state.fingers[100] = Some("abc".to_string());
        }
        // Both fingers precede "baz"; the higher slot is checked first.
        assert_eq!(
            n.closest_preceding_finger(Id::of("baz")).as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn closest_preceding_finger_excludes_the_target_itself() {
        let n = node("foo");
        {
            let mut state = n.state.write().unwrap();
            state.fingers[20] = Some("bar".to_string());
        }
        // The only finger is the target; the strict interval rejects it.
        assert_eq!(n.closest_preceding_finger(Id::of("bar")), None);
    }

    #[test]
    fn splice_keeps_order_and_caps_length() {
        let reported = vec!["C".to_string(), "D".to_string(), "E".to_string()];
        assert_eq!(splice_successors("B", &reported, "A", 3), vec!["B", "C", "D"]);
        assert_eq!(splice_successors("B", &[], "A", 3), vec!["B"]);
    }

    #[test]
    fn splice_cuts_just_past_self() {
        let reported = vec!["C".to_string(), "A".to_string(), "D".to_string()];
        assert_eq!(splice_successors("B", &reported, "A", 10), vec!["B", "C", "A"]);
    }

    #[test]
    fn splice_skips_empty_entries() {
        let reported = vec![String::new(), "C".to_string()];
        assert_eq!(splice_successors("B", &reported, "A", 4), vec!["B", "C"]);
    }

    #[test]
    fn dump_collapses_finger_runs() {
        let n = node("baz");
        {
            let mut state = n.state.write().unwrap();
            for k in 1..=3 {
                state.fingers[k] = Some("bar".to_string());
            }
        }
        n.put("foo".into(), b"hello".to_vec());

        let dump = n.dump();
        // Slots 1..=3 collapse to one line at the run's last index.
        assert!(dump.contains(" [  3]: "));
        assert!(!dump.contains(" [  2]: "));
        // Slots 4..=160 are one empty run.
        assert!(dump.contains(" [160]: (empty)"));
        assert!(dump.contains("pred:    (empty)"));
        assert!(dump.contains("0beec7b5.. foo => hello"));
    }
}
