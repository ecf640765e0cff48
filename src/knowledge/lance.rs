//! LanceDB Vector Store - 로컬 벡터 검색
//!
//! 자격 증명 없이 동작하는 로컬 백엔드입니다 (`VECTOR_BACKEND=lance`).
//! 테이블 이름은 설정된 컬렉션 이름을 그대로 사용합니다.
//! 메타데이터는 JSON 문자열 컬럼으로, 출처는 삭제 필터용 `source` 컬럼으로 저장합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::document::{Document, Metadata};
use super::vector::{SearchResult, VectorRecord, VectorStore, EMBEDDING_DIMENSION};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    table_name: String,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `table_name` - 벡터 테이블 이름 (컬렉션 이름)
    pub async fn open(path: &Path, table_name: &str) -> Result<Self> {
        if table_name.trim().is_empty() {
            anyhow::bail!("LanceDB table name is empty");
        }

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        tracing::debug!("LanceDB opened at {} (table: {})", path_str, table_name);
        Ok(Self {
            db,
            table_name: table_name.to_string(),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ])
    }

    /// 레코드들을 Arrow RecordBatch로 변환
    fn records_to_batch(records: &[VectorRecord]) -> Result<RecordBatch> {
        if records.is_empty() {
            anyhow::bail!("Cannot create batch from empty records");
        }

        for record in records {
            if record.embedding.len() != EMBEDDING_DIMENSION as usize {
                anyhow::bail!(
                    "Embedding dimension mismatch for {}: expected {}, got {}",
                    record.id,
                    EMBEDDING_DIMENSION,
                    record.embedding.len()
                );
            }
        }

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let sources: Vec<&str> = records.iter().map(|r| r.source()).collect();
        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        let metadata: Vec<String> = records
            .iter()
            .map(|r| serde_json::to_string(&r.metadata))
            .collect::<Result<_, _>>()
            .context("Failed to serialize metadata")?;

        let embeddings_flat: Vec<f32> = records
            .iter()
            .flat_map(|r| r.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        RecordBatch::try_new(
            Arc::new(Self::create_schema()),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(sources)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.iter().any(|n| n == &self.table_name))
            .unwrap_or(false)
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("Failed to open table")
    }
}

/// SQL 문자열 리터럴 (작은따옴표 이스케이프)
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `id IN (...)` 필터
fn id_filter(records: &[VectorRecord]) -> String {
    let quoted: Vec<String> = records.iter().map(|r| quote(&r.id)).collect();
    format!("id IN ({})", quoted.join(", "))
}

/// `source = '...'` 필터
fn source_filter(source: &str) -> String {
    format!("source = {}", quote(source))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert_batch(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let batch = Self::records_to_batch(records)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            let table = self.open_table().await?;

            // 같은 ID 먼저 삭제 후 추가
            table
                .delete(&id_filter(records))
                .await
                .context("Failed to delete existing records")?;

            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add records to table")?;
        } else {
            self.db
                .create_table(&self.table_name, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(records.len())
    }

    async fn delete_source(&self, source: &str) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let filter = source_filter(source);

        let existing = table
            .count_rows(Some(filter.clone()))
            .await
            .context("Failed to count source rows")?;
        if existing == 0 {
            return Ok(0);
        }

        table
            .delete(&filter)
            .await
            .context("Failed to delete source rows")?;

        tracing::debug!("Deleted {} rows of {}", existing, source);
        Ok(existing)
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let results = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;
        let mut search_results = Vec::new();

        for batch in batches {
            let ids = batch
                .column_by_name("id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing id column"))?;

            let contents = batch
                .column_by_name("content")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing content column"))?;

            let metadata = batch
                .column_by_name("metadata")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing metadata column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                let meta: Metadata = serde_json::from_str(metadata.value(i))
                    .context("Failed to parse stored metadata")?;

                search_results.push(SearchResult {
                    id: ids.value(i).to_string(),
                    document: Document::with_metadata(contents.value(i), meta),
                    // L2 거리 -> 유사도 근사
                    similarity: 1.0 / (1.0 + distances.value(i)),
                });
            }
        }

        Ok(search_results)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self.open_table().await?;
        table.count_rows(None).await.context("Failed to count rows")
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

// ============================================================================
// Tests
// ============================================================================
