use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use super::{apply_set, new_document_id, not_found, Document, DocumentStore, Filter, Patch, Snapshot, WriteOp};
use crate::entities::document;
use crate::error::AppError;

/// Document store kept in a single SQLite table, one JSON body per
/// `(collection, doc_id)` pair.
pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_row<C: ConnectionTrait>(
        db: &C,
        collection: &str,
        id: &str,
    ) -> Result<Option<document::Model>, AppError> {
        Ok(document::Entity::find()
            .filter(document::Column::Collection.eq(collection))
            .filter(document::Column::DocId.eq(id))
            .one(db)
            .await?)
    }

    async fn apply_op_with_conn<C: ConnectionTrait>(db: &C, op: WriteOp) -> Result<(), AppError> {
        let now = Utc::now();
        match op {
            WriteOp::Set {
                collection,
                id,
                record,
                merge,
            } => match Self::find_row(db, &collection, &id).await? {
                Some(row) => {
                    let current = decode_body(&row)?;
                    let body = apply_set(Some(current), record, merge);
                    let mut active: document::ActiveModel = row.into();
                    active.body = Set(serde_json::to_string(&body)?);
                    active.updated_at = Set(now);
                    active.update(db).await?;
                }
                None => {
                    let active = document::ActiveModel {
                        collection: Set(collection),
                        doc_id: Set(id),
                        body: Set(serde_json::to_string(&record)?),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    };
                    document::Entity::insert(active).exec(db).await?;
                }
            },
            WriteOp::Update {
                collection,
                id,
                patch,
            } => {
                let row = Self::find_row(db, &collection, &id)
                    .await?
                    .ok_or_else(|| not_found(&collection, &id))?;
                let mut body = decode_body(&row)?;
                patch.apply(&mut body);
                let mut active: document::ActiveModel = row.into();
                active.body = Set(serde_json::to_string(&body)?);
                active.updated_at = Set(now);
                active.update(db).await?;
            }
        }
        Ok(())
    }
}

fn decode_body(row: &document::Model) -> Result<Document, AppError> {
    Ok(serde_json::from_str(&row.body)?)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        Self::find_row(&self.db, collection, id)
            .await?
            .map(|row| decode_body(&row))
            .transpose()
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        record: Document,
        merge: bool,
    ) -> Result<(), AppError> {
        Self::apply_op_with_conn(&self.db, WriteOp::set(collection, id, record, merge)).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<(), AppError> {
        Self::apply_op_with_conn(&self.db, WriteOp::update(collection, id, patch)).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Snapshot>, AppError> {
        let rows = document::Entity::find()
            .filter(document::Column::Collection.eq(collection))
            .order_by_asc(document::Column::DocId)
            .all(&self.db)
            .await?;

        let mut matched = Vec::new();
        for row in rows {
            if limit.is_some_and(|limit| matched.len() >= limit) {
                break;
            }
            let data = decode_body(&row)?;
            if filters.iter().all(|filter| filter.matches(&data)) {
                matched.push(Snapshot {
                    id: row.doc_id,
                    data,
                });
            }
        }
        debug!(collection, matched = matched.len(), "query finished");
        Ok(matched)
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), AppError> {
        let count = ops.len();
        let txn = self.db.begin().await?;
        let result: Result<(), AppError> = async {
            for op in ops {
                Self::apply_op_with_conn(&txn, op).await?;
            }
            Ok(())
        }
        .await;

        finalize_transaction(txn, result).await?;
        debug!(count, "batch committed");
        Ok(())
    }

    fn generate_id(&self, _collection: &str) -> String {
        new_document_id()
    }
}

async fn finalize_transaction<T>(
    txn: DatabaseTransaction,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                return Err(rollback_err.into());
            }
            Err(err)
        }
    }
}
