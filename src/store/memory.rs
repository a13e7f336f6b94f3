use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use super::{apply_set, new_document_id, not_found, Document, DocumentStore, Filter, Patch, Snapshot, WriteOp};
use crate::error::AppError;

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

/// In-process store for tests. Reads and writes can be made to fail, and
/// writes can be held behind a semaphore to observe in-flight state.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    write_gate: Mutex<Option<Arc<Semaphore>>>,
    failing_docs: Mutex<BTreeSet<(String, String)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub async fn set_write_gate(&self, gate: Option<Arc<Semaphore>>) {
        *self.write_gate.lock().await = gate;
    }

    /// Rejects any write call that touches `collection/id`, leaving other
    /// writes alone.
    pub async fn fail_writes_to(&self, collection: &str, id: &str) {
        self.failing_docs
            .lock()
            .await
            .insert((collection.to_string(), id.to_string()));
    }

    /// Number of successful write calls (a batch counts once).
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn check_reads(&self) -> Result<(), AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("injected read failure".to_string()));
        }
        Ok(())
    }

    async fn before_write(&self) -> Result<(), AppError> {
        let gate = self.write_gate.lock().await.clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| AppError::StoreUnavailable("write gate closed".to_string()))?;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), AppError> {
        self.before_write().await?;
        {
            let failing = self.failing_docs.lock().await;
            if let Some(op) = ops.iter().find(|op| failing.contains(&op_target(op))) {
                let (collection, id) = op_target(op);
                return Err(AppError::StoreUnavailable(format!(
                    "injected write failure for {collection}/{id}"
                )));
            }
        }
        let mut collections = self.collections.lock().await;
        let mut staged = collections.clone();
        for op in ops {
            apply_op(&mut staged, op)?;
        }
        *collections = staged;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn op_target(op: &WriteOp) -> (String, String) {
    match op {
        WriteOp::Set { collection, id, .. } | WriteOp::Update { collection, id, .. } => {
            (collection.clone(), id.clone())
        }
    }
}

fn apply_op(collections: &mut Collections, op: WriteOp) -> Result<(), AppError> {
    match op {
        WriteOp::Set {
            collection,
            id,
            record,
            merge,
        } => {
            let docs = collections.entry(collection).or_default();
            let merged = apply_set(docs.remove(&id), record, merge);
            docs.insert(id, merged);
        }
        WriteOp::Update { collection, id, patch } => {
            let doc = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
                .ok_or_else(|| not_found(&collection, &id))?;
            patch.apply(doc);
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        self.check_reads()?;
        Ok(self
            .collections
            .lock()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        record: Document,
        merge: bool,
    ) -> Result<(), AppError> {
        self.commit(vec![WriteOp::set(collection, id, record, merge)])
            .await
    }

    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<(), AppError> {
        self.commit(vec![WriteOp::update(collection, id, patch)]).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Snapshot>, AppError> {
        self.check_reads()?;
        let collections = self.collections.lock().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(_, doc)| filters.iter().all(|filter| filter.matches(doc)))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(id, doc)| Snapshot {
                id: id.clone(),
                data: doc.clone(),
            })
            .collect())
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), AppError> {
        self.commit(ops).await
    }

    fn generate_id(&self, _collection: &str) -> String {
        new_document_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    #[tokio::test]
    async fn batch_with_missing_update_target_writes_nothing() {
        let store = MemoryStore::default();
        let err = store
            .batch_write(vec![
                WriteOp::set("weeklyPlan", "2026-W43", doc(json!({ "weekId": "2026-W43" })), false),
                WriteOp::update("weeklySteps", "missing", Patch::new().set("status", "completed")),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.count("weeklyPlan").await, 0);
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn query_applies_filters_and_limit() {
        let store = MemoryStore::default();
        for (id, status) in [("a", "pending"), ("b", "completed"), ("c", "pending")] {
            store
                .set("weeklySteps", id, doc(json!({ "status": status })), false)
                .await
                .expect("set");
        }
        let pending = store
            .query("weeklySteps", &[Filter::eq("status", "pending")], None)
            .await
            .expect("query");
        let ids: Vec<&str> = pending.iter().map(|snap| snap.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let limited = store
            .query("weeklySteps", &[], Some(1))
            .await
            .expect("query");
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_store_unavailable() {
        let store = MemoryStore::default();
        store.fail_writes(true);
        let err = store
            .set("dailyMetrics", "2026-10-13", Document::new(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));

        store.fail_reads(true);
        assert!(store.get("dailyMetrics", "2026-10-13").await.is_err());
    }

    #[tokio::test]
    async fn targeted_failure_rejects_only_batches_touching_that_record() {
        let store = MemoryStore::default();
        store.fail_writes_to("weeklySteps", "a").await;
        let err = store
            .batch_write(vec![
                WriteOp::set("dailyMetrics", "2026-10-13", Document::new(), true),
                WriteOp::set("weeklySteps", "a", doc(json!({ "status": "pending" })), false),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert_eq!(store.count("dailyMetrics").await, 0);

        store
            .set("weeklySteps", "b", doc(json!({ "status": "pending" })), false)
            .await
            .expect("other record");
        assert_eq!(store.commits(), 1);
    }
}
