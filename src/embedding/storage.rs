// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-based vector store for document chunks.
//!
//! Chunks live in named collections inside a single database file under the
//! persist directory. Each collection records the embedding model it was
//! built with. Search is brute-force cosine similarity.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::chunker::DocumentChunk;
use crate::errors::RagError;

/// Default embedding dimension for sentence-transformers/all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Database file name inside the persist directory.
pub const DB_FILE_NAME: &str = "vectors.sqlite";

const SCHEMA_VERSION: &str = "1";

/// A chunk paired with its relevance score, most relevant first in results.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    /// Ranking signal only: cosine similarity or re-ranker score
    pub score: f32,
}

/// SQLite-backed vector store.
pub struct VectorStore {
    conn: Connection,
    path: PathBuf,
}

impl VectorStore {
    /// Opens or creates a store at the specified database path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let store = Self { conn, path };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens the store file inside a persist directory.
    pub fn open_in_dir<P: AsRef<Path>>(persist_dir: P) -> Result<Self> {
        Self::open(persist_dir.as_ref().join(DB_FILE_NAME))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                model_id TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                collection TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                text TEXT NOT NULL,
                page INTEGER NOT NULL,
                start_offset INTEGER NOT NULL,
                source_path TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (collection, chunk_id)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_collection
                ON chunks(collection);
            "#,
            )
            .context("Failed to initialize database schema")?;

        self.conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }

    /// Returns the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the storage connection explicitly.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }

    /// Registers a collection for a model, or checks that an existing
    /// collection was built with the same model.
    pub fn ensure_collection(&self, name: &str, model_id: &str) -> Result<()> {
        match self.collection_model(name)? {
            Some(stored) if stored != model_id => Err(RagError::EmbeddingModelMismatch {
                collection: name.to_string(),
                stored,
                requested: model_id.to_string(),
            }
            .into()),
            Some(_) => Ok(()),
            None => {
                self.conn.execute(
                    "INSERT INTO collections (name, model_id, created_at) VALUES (?1, ?2, ?3)",
                    params![name, model_id, unix_now()],
                )?;
                Ok(())
            }
        }
    }

    /// Returns the model id a collection was built with.
    pub fn collection_model(&self, name: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT model_id FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query collection")
    }

    /// Lists collection names.
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list collections")?;
        Ok(names)
    }

    /// Removes a collection and all of its chunks.
    pub fn delete_collection(&mut self, name: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM chunks WHERE collection = ?1", params![name])?;
        tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Counts chunks stored in a collection.
    pub fn count(&self, collection: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Lists chunk ids in insertion order.
    pub fn list_ids(&self, collection: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT chunk_id FROM chunks WHERE collection = ?1 ORDER BY rowid")?;
        let ids = stmt
            .query_map(params![collection], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list chunk ids")?;
        Ok(ids)
    }

    /// Inserts chunks with their embeddings in a single transaction.
    ///
    /// Chunks whose id already exists in the collection are left untouched.
    /// Returns the number of rows actually inserted.
    pub fn insert_chunks(
        &mut self,
        collection: &str,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Chunk/embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            );
        }

        let created_at = unix_now();
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO chunks (
                    collection, chunk_id, text, page, start_offset, source_path,
                    embedding, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(collection, chunk_id) DO NOTHING
                "#,
            )?;

            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                inserted += stmt.execute(params![
                    collection,
                    chunk.id,
                    chunk.text,
                    chunk.page,
                    chunk.start_offset as i64,
                    chunk.source_path,
                    Self::embedding_to_blob(embedding),
                    created_at
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    /// Retrieves a chunk by id.
    pub fn get_chunk(&self, collection: &str, chunk_id: &str) -> Result<Option<DocumentChunk>> {
        self.conn
            .query_row(
                r#"
                SELECT chunk_id, text, page, start_offset, source_path
                FROM chunks
                WHERE collection = ?1 AND chunk_id = ?2
                "#,
                params![collection, chunk_id],
                Self::row_to_chunk,
            )
            .optional()
            .context("Failed to query chunk")
    }

    /// Performs brute-force similarity search within a collection.
    ///
    /// Returns chunks sorted by descending cosine similarity. Equal scores
    /// keep insertion order, which callers should not rely on.
    pub fn search_similar(
        &self,
        collection: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT chunk_id, text, page, start_offset, source_path, embedding
            FROM chunks
            WHERE collection = ?1
            ORDER BY rowid
            "#,
        )?;

        let mut results: Vec<ScoredChunk> = stmt
            .query_map(params![collection], |row| {
                let chunk = Self::row_to_chunk(row)?;
                let embedding_blob: Vec<u8> = row.get(5)?;
                let embedding = Self::blob_to_embedding(&embedding_blob);
                let score = Self::cosine_similarity(query_embedding, &embedding);
                Ok(ScoredChunk { chunk, score })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to scan chunk embeddings")?;

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        Ok(results)
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentChunk> {
        let start_offset: i64 = row.get(3)?;
        Ok(DocumentChunk {
            id: row.get(0)?,
            text: row.get(1)?,
            page: row.get(2)?,
            start_offset: start_offset as usize,
            source_path: row.get(4)?,
        })
    }

    /// Converts an embedding vector to a compact blob.
    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Converts a blob back to an embedding vector.
    fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    /// Computes cosine similarity between two vectors.
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if magnitude_a == 0.0 || magnitude_b == 0.0 {
            return 0.0;
        }

        dot_product / (magnitude_a * magnitude_b)
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chunk(text: &str, page: u32) -> DocumentChunk {
        DocumentChunk::new(text.to_string(), 0, page, "doc.pdf")
    }

    #[test]
    fn test_storage_create_and_open() {
        let dir = tempdir().unwrap();
        let persist_dir = dir.path().join("db");

        let store = VectorStore::open_in_dir(&persist_dir).unwrap();
        assert!(persist_dir.join(DB_FILE_NAME).exists());
        store.close().unwrap();

        let store = VectorStore::open_in_dir(&persist_dir).unwrap();
        store.close().unwrap();
    }

    #[test]
    fn test_insert_and_get_chunk() {
        let dir = tempdir().unwrap();
        let mut store = VectorStore::open_in_dir(dir.path()).unwrap();
        store.ensure_collection("docs", "m").unwrap();

        let c = DocumentChunk::new("hello".to_string(), 42, 3, "a.pdf");
        store
            .insert_chunks("docs", std::slice::from_ref(&c), &[vec![1.0, 0.0]])
            .unwrap();

        let got = store.get_chunk("docs", &c.id).unwrap().unwrap();
        assert_eq!(got, c);
        assert!(store.get_chunk("other", &c.id).unwrap().is_none());
    }

    #[test]
    fn test_reinsert_does_not_duplicate() {
        let dir = tempdir().unwrap();
        let mut store = VectorStore::open_in_dir(dir.path()).unwrap();
        let chunks = vec![chunk("a", 1), chunk("b", 1)];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];

        assert_eq!(store.insert_chunks("docs", &chunks, &embeddings).unwrap(), 2);
        assert_eq!(store.insert_chunks("docs", &chunks, &embeddings).unwrap(), 0);
        assert_eq!(store.count("docs").unwrap(), 2);
        assert_eq!(
            store.list_ids("docs").unwrap(),
            vec![chunks[0].id.clone(), chunks[1].id.clone()]
        );
    }

    #[test]
    fn test_count_mismatch_is_error() {
        let dir = tempdir().unwrap();
        let mut store = VectorStore::open_in_dir(dir.path()).unwrap();
        let err = store
            .insert_chunks("docs", &[chunk("a", 1)], &[])
            .unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_similarity_search() {
        let dir = tempdir().unwrap();
        let mut store = VectorStore::open_in_dir(dir.path()).unwrap();

        let chunks = vec![chunk("a", 1), chunk("b", 1), chunk("c", 2)];
        let embeddings = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.9, 0.1, 0.0]];
        store.insert_chunks("docs", &chunks, &embeddings).unwrap();

        let results = store.search_similar("docs", &[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "a");
        assert_eq!(results[1].chunk.text, "c");
        assert!((results[0].score - 1.0).abs() < 0.0001);

        assert!(store.search_similar("docs", &[1.0, 0.0, 0.0], 0).unwrap().is_empty());
        assert!(store.search_similar("empty", &[1.0, 0.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_collections_are_isolated() {
        let dir = tempdir().unwrap();
        let mut store = VectorStore::open_in_dir(dir.path()).unwrap();
        store
            .insert_chunks("one", &[chunk("a", 1)], &[vec![1.0]])
            .unwrap();
        assert_eq!(store.count("one").unwrap(), 1);
        assert_eq!(store.count("two").unwrap(), 0);
    }

    #[test]
    fn test_model_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let store = VectorStore::open_in_dir(dir.path()).unwrap();
        store.ensure_collection("docs", "model-a").unwrap();
        store.ensure_collection("docs", "model-a").unwrap();

        let err = store.ensure_collection("docs", "model-b").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::EmbeddingModelMismatch { .. })
        ));
        assert_eq!(store.list_collections().unwrap(), vec!["docs".to_string()]);
    }

    #[test]
    fn test_delete_collection() {
        let dir = tempdir().unwrap();
        let mut store = VectorStore::open_in_dir(dir.path()).unwrap();
        store.ensure_collection("docs", "m").unwrap();
        store
            .insert_chunks("docs", &[chunk("a", 1), chunk("b", 1)], &[vec![1.0], vec![0.5]])
            .unwrap();

        assert_eq!(store.delete_collection("docs").unwrap(), 2);
        assert_eq!(store.count("docs").unwrap(), 0);
        assert!(store.collection_model("docs").unwrap().is_none());
    }

    #[test]
    fn test_unwritable_path_is_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let err = VectorStore::open_in_dir(blocker.join("db")).err().unwrap();
        assert!(err.to_string().contains("Failed to create directory"));
    }
}
