//! In-process backend with scripted responses
//!
//! Farthest/closest answers are queued per cluster. The last queued value
//! repeats; a cluster with nothing queued answers the sentinel.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use clab_common::api::{ClusterId, Exemplar, FinalLabels, FinalLabelsResponse};
use clab_review::gateway::{ClusterBackend, GatewayError};

/// One backend call, as recorded by the script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Upload,
    Farthest(u32),
    Closest(u32),
    Subcluster(u32),
    LabelTrue(u32),
    LabelFalse(u32),
    FinalLabels,
}

#[derive(Default)]
struct Script {
    reference_row: usize,
    farthest: HashMap<u32, VecDeque<i64>>,
    closest: HashMap<u32, VecDeque<i64>>,
    labels: Vec<String>,
    cluster_ids: Vec<i64>,
    /// (call, 1-based occurrence) pairs that fail
    failures: Vec<(Call, usize)>,
    calls: Vec<Call>,
}

impl Script {
    /// Record the call and consume an injected failure for it
    fn enter(&mut self, call: Call) -> Result<(), GatewayError> {
        self.calls.push(call);
        let occurrence = self.calls.iter().filter(|c| **c == call).count();
        if let Some(pos) = self.failures.iter().position(|f| *f == (call, occurrence)) {
            self.failures.remove(pos);
            return Err(GatewayError::Network("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

fn next_value(queue: Option<&mut VecDeque<i64>>) -> i64 {
    match queue {
        Some(q) if q.len() > 1 => q.pop_front().unwrap_or(-1),
        Some(q) => q.front().copied().unwrap_or(-1),
        None => -1,
    }
}

pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new(reference_row: usize) -> Self {
        Self {
            script: Mutex::new(Script {
                reference_row,
                ..Script::default()
            }),
        }
    }

    /// Queue farthest answers for `cluster`
    pub fn farthest(self, cluster: u32, values: &[i64]) -> Self {
        self.script
            .lock()
            .unwrap()
            .farthest
            .insert(cluster, values.iter().copied().collect());
        self
    }

    /// Queue closest answers for `cluster`
    pub fn closest(self, cluster: u32, values: &[i64]) -> Self {
        self.script
            .lock()
            .unwrap()
            .closest
            .insert(cluster, values.iter().copied().collect());
        self
    }

    pub fn final_labels(self, labels: &[&str], cluster_ids: &[i64]) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            script.labels = labels.iter().map(|s| s.to_string()).collect();
            script.cluster_ids = cluster_ids.to_vec();
        }
        self
    }

    /// Fail the first occurrence of `call` with a network error
    pub fn fail_once(self, call: Call) -> Self {
        self.fail_on(call, 1)
    }

    /// Fail the `occurrence`-th (1-based) occurrence of `call`
    pub fn fail_on(self, call: Call, occurrence: usize) -> Self {
        self.script.lock().unwrap().failures.push((call, occurrence));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

#[async_trait]
impl ClusterBackend for ScriptedBackend {
    async fn upload(&self, _file_name: &str, bytes: &[u8]) -> Result<usize, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.enter(Call::Upload)?;
        assert!(!bytes.is_empty(), "upload sent an empty file");
        Ok(script.reference_row)
    }

    async fn fetch_farthest(&self, cluster: ClusterId) -> Result<Exemplar, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.enter(Call::Farthest(cluster.0))?;
        let value = next_value(script.farthest.get_mut(&cluster.0));
        Exemplar::from_wire(value).map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    async fn fetch_closest(&self, cluster: ClusterId) -> Result<Exemplar, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.enter(Call::Closest(cluster.0))?;
        let value = next_value(script.closest.get_mut(&cluster.0));
        Exemplar::from_wire(value).map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    async fn request_subcluster(&self, cluster: ClusterId) -> Result<(), GatewayError> {
        self.script.lock().unwrap().enter(Call::Subcluster(cluster.0))
    }

    async fn label_true(&self, cluster: ClusterId) -> Result<(), GatewayError> {
        self.script.lock().unwrap().enter(Call::LabelTrue(cluster.0))
    }

    async fn label_false(&self, cluster: ClusterId) -> Result<(), GatewayError> {
        self.script.lock().unwrap().enter(Call::LabelFalse(cluster.0))
    }

    async fn fetch_final_labels(&self) -> Result<FinalLabels, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.enter(Call::FinalLabels)?;
        FinalLabels::from_wire(FinalLabelsResponse {
            labels: script.labels.clone(),
            cluster_id: script.cluster_ids.clone(),
        })
        .map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}
