// Copyright 2025 Judgeflow Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ordered, per-evaluation observer chain.
//!
//! Listeners are registered on a metric as factories; the bus asks each
//! factory for a fresh `Listener` instance at the start of every evaluation
//! (`for_evaluation`) so state kept by one evaluation never leaks into the
//! next. Registration uses copy-on-write: `register`/`unregister` swap in a
//! new sorted `Arc<Vec<_>>` rather than mutating in place, so a bus snapshot
//! taken mid-evaluation is unaffected by concurrent registration.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::context::{
    MetricEvaluationContext, MetricEvaluationResult, ModelExclusionEvent, StepContext, StepResults,
};

#[async_trait]
pub trait Listener: Send + Sync {
    async fn before_metric_evaluation(&self, _ctx: &MetricEvaluationContext) -> anyhow::Result<()> {
        Ok(())
    }
    async fn before_step(&self, _step: &StepContext) -> anyhow::Result<()> {
        Ok(())
    }
    async fn after_step(&self, _results: &StepResults) -> anyhow::Result<()> {
        Ok(())
    }
    async fn on_model_excluded(&self, _event: &ModelExclusionEvent) -> anyhow::Result<()> {
        Ok(())
    }
    async fn after_metric_evaluation(&self, _result: &MetricEvaluationResult) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Registered on a metric; instantiates a fresh `Listener` per evaluation.
/// Stateless listeners typically return a clone of a shared `Arc<Self>`.
pub trait ListenerFactory: Send + Sync {
    /// Lower values run first. Ties keep registration order.
    fn order(&self) -> i32 {
        100
    }

    fn for_evaluation(&self) -> Arc<dyn Listener>;
}

#[derive(Default)]
pub struct ListenerBus {
    factories: RwLock<Arc<Vec<Arc<dyn ListenerFactory>>>>,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn register(&self, factory: Arc<dyn ListenerFactory>) {
        let mut guard = self.factories.write();
        let mut next = (**guard).clone();
        next.push(factory);
        next.sort_by_key(|f| f.order());
        *guard = Arc::new(next);
    }

    /// Snapshots the current factory list and instantiates one listener per
    /// factory, already sorted by `order`. The returned handle is owned by
    /// a single evaluation.
    pub fn for_evaluation(&self) -> EvaluationListeners {
        let factories = self.factories.read().clone();
        let listeners = factories.iter().map(|f| f.for_evaluation()).collect();
        EvaluationListeners { listeners }
    }
}

pub struct EvaluationListeners {
    listeners: Vec<Arc<dyn Listener>>,
}

macro_rules! fire {
    ($self:ident, $method:ident, $arg:expr) => {{
        let arg_ref = $arg;
        for listener in &$self.listeners {
            let listener = listener.clone();
            let arg = (*arg_ref).clone();
            let task = tokio::spawn(async move { listener.$method(&arg).await });
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, event = stringify!($method), "listener returned an error");
                }
                Err(join_err) => {
                    tracing::warn!(error = %join_err, event = stringify!($method), "listener panicked");
                }
            }
        }
    }};
}

impl EvaluationListeners {
    pub async fn before_metric_evaluation(&self, ctx: &MetricEvaluationContext) {
        fire!(self, before_metric_evaluation, ctx);
    }

    pub async fn before_step(&self, step: &StepContext) {
        fire!(self, before_step, step);
    }

    pub async fn after_step(&self, results: &StepResults) {
        fire!(self, after_step, results);
    }

    pub async fn on_model_excluded(&self, event: &ModelExclusionEvent) {
        fire!(self, on_model_excluded, event);
    }

    pub async fn after_metric_evaluation(&self, result: &MetricEvaluationResult) {
        fire!(self, after_metric_evaluation, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingListener {
        id: &'static str,
        order: Vec<Arc<Mutex<Vec<&'static str>>>>,
    }

    struct RecordingFactory {
        id: &'static str,
        order: i32,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ListenerFactory for RecordingFactory {
        fn order(&self) -> i32 {
            self.order
        }

        fn for_evaluation(&self) -> Arc<dyn Listener> {
            Arc::new(RecordingListener {
                id: self.id,
                order: vec![self.log.clone()],
            })
        }
    }

    #[async_trait]
    impl Listener for RecordingListener {
        async fn before_metric_evaluation(&self, _ctx: &MetricEvaluationContext) -> anyhow::Result<()> {
            self.order[0].lock().push(self.id);
            Ok(())
        }
    }

    struct FailingListener;

    #[async_trait]
    impl Listener for FailingListener {
        async fn before_metric_evaluation(&self, _ctx: &MetricEvaluationContext) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct FailingFactory;

    impl ListenerFactory for FailingFactory {
        fn order(&self) -> i32 {
            -100
        }

        fn for_evaluation(&self) -> Arc<dyn Listener> {
            Arc::new(FailingListener)
        }
    }

    fn dummy_ctx() -> MetricEvaluationContext {
        MetricEvaluationContext {
            metric_name: "test".into(),
            sample: crate::sample::Sample::new("r"),
            initial_models: vec![],
            total_steps: 1,
        }
    }

    #[tokio::test]
    async fn listeners_fire_in_ascending_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = ListenerBus::new();
        bus.register(Arc::new(RecordingFactory { id: "b", order: 20, log: log.clone() }));
        bus.register(Arc::new(RecordingFactory { id: "a", order: 10, log: log.clone() }));

        bus.for_evaluation().before_metric_evaluation(&dummy_ctx()).await;

        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn a_failing_listener_does_not_block_later_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = ListenerBus::new();
        bus.register(Arc::new(FailingFactory));
        bus.register(Arc::new(RecordingFactory { id: "after", order: 0, log: log.clone() }));

        bus.for_evaluation().before_metric_evaluation(&dummy_ctx()).await;

        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[tokio::test]
    async fn registering_mid_snapshot_does_not_affect_an_in_flight_evaluation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = ListenerBus::new();
        bus.register(Arc::new(RecordingFactory { id: "first", order: 0, log: log.clone() }));

        let snapshot = bus.for_evaluation();
        bus.register(Arc::new(RecordingFactory { id: "late", order: -10, log: log.clone() }));

        snapshot.before_metric_evaluation(&dummy_ctx()).await;

        assert_eq!(*log.lock(), vec!["first"]);
    }
}
