use anyhow::{Context, Result};
use libsql::{Connection, Row};

use crate::model::{Book, BookSummary};
use crate::object_id::ObjectId;

/// The `books` collection.
///
/// Borrows the shared connection; construct one per request.
pub struct BookStore<'a> {
    conn: &'a Connection,
}

impl<'a> BookStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Every book as a summary, in insertion order.
    pub async fn find(&self) -> Result<Vec<BookSummary>> {
        let query = r#"
            SELECT id, title, json_array_length(comments)
            FROM books
            ORDER BY rowid
        "#;

        let mut rows = self.conn.query(query, ()).await?;
        let mut books = Vec::new();

        while let Some(row) = rows.next().await? {
            let count: i64 = row.get(2)?;
            books.push(BookSummary {
                id: Self::row_id(&row)?,
                title: row.get(1)?,
                commentcount: count.max(0) as usize,
            });
        }

        Ok(books)
    }

    pub async fn find_one(&self, id: &ObjectId) -> Result<Option<Book>> {
        let query = "SELECT id, title, comments FROM books WHERE id = ?";

        let mut rows = self
            .conn
            .query(query, libsql::params![id.to_string()])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_book(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Inserts a book with no comments and returns its new id.
    pub async fn insert_one(&self, title: &str) -> Result<ObjectId> {
        let id = ObjectId::new();
        self.conn
            .execute(
                "INSERT INTO books (id, title) VALUES (?, ?)",
                libsql::params![id.to_string(), title],
            )
            .await
            .with_context(|| format!("failed to insert book {title:?}"))?;
        Ok(id)
    }

    /// Appends `comment` to the book's comments in a single statement.
    /// Returns the number of documents modified.
    pub async fn update_one(&self, id: &ObjectId, comment: &str) -> Result<u64> {
        let query = r#"
            UPDATE books SET comments = json_insert(comments, '$[#]', ?)
            WHERE id = ?
            RETURNING id
        "#;
        self.count_returned(query, libsql::params![comment, id.to_string()])
            .await
    }

    /// Returns the number of documents deleted.
    pub async fn delete_one(&self, id: &ObjectId) -> Result<u64> {
        let query = "DELETE FROM books WHERE id = ? RETURNING id";
        self.count_returned(query, libsql::params![id.to_string()]).await
    }

    /// Returns the number of documents deleted.
    pub async fn delete_many(&self) -> Result<u64> {
        self.count_returned("DELETE FROM books RETURNING id", ()).await
    }

    /// Counts the rows a `RETURNING` statement yields. The connection is shared,
    /// so its `changes()` counter may already reflect another request's write.
    async fn count_returned(&self, query: &str, params: impl libsql::params::IntoParams) -> Result<u64> {
        let mut rows = self.conn.query(query, params).await?;
        let mut count = 0;
        while rows.next().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    fn row_id(row: &Row) -> Result<ObjectId> {
        let raw: String = row.get(0)?;
        Ok(raw.parse()?)
    }

    fn row_to_book(row: &Row) -> Result<Book> {
        let comments: String = row.get(2)?;
        Ok(Book {
            id: Self::row_id(row)?,
            title: row.get(1)?,
            comments: serde_json::from_str(&comments).context("malformed comments array")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_insert_then_find_one_has_empty_comments() {
        let db = Database::in_memory().await.unwrap();
        let store = BookStore::new(db.connection());

        let id = store.insert_one("New book 1").await.unwrap();
        let book = store.find_one(&id).await.unwrap().unwrap();

        assert_eq!(book.id, id);
        assert_eq!(book.title, "New book 1");
        assert!(book.comments.is_empty());
    }

    #[tokio::test]
    async fn test_find_one_missing_is_none() {
        let db = Database::in_memory().await.unwrap();
        let store = BookStore::new(db.connection());

        assert!(store.find_one(&ObjectId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_one_appends_in_order() {
        let db = Database::in_memory().await.unwrap();
        let store = BookStore::new(db.connection());
        let id = store.insert_one("NodeJS").await.unwrap();

        assert_eq!(store.update_one(&id, "first").await.unwrap(), 1);
        assert_eq!(store.update_one(&id, "second").await.unwrap(), 1);
        assert_eq!(store.update_one(&id, "first").await.unwrap(), 1);

        let book = store.find_one(&id).await.unwrap().unwrap();
        assert_eq!(book.comments, vec!["first", "second", "first"]);
    }

    #[tokio::test]
    async fn test_update_one_keeps_comment_as_text() {
        let db = Database::in_memory().await.unwrap();
        let store = BookStore::new(db.connection());
        let id = store.insert_one("Quoting").await.unwrap();

        store.update_one(&id, r#"["not", "an array"]"#).await.unwrap();
        store.update_one(&id, "42").await.unwrap();

        let book = store.find_one(&id).await.unwrap().unwrap();
        assert_eq!(book.comments, vec![r#"["not", "an array"]"#, "42"]);
    }

    #[tokio::test]
    async fn test_update_one_missing_modifies_nothing() {
        let db = Database::in_memory().await.unwrap();
        let store = BookStore::new(db.connection());

        assert_eq!(store.update_one(&ObjectId::new(), "lost").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_reports_comment_counts_in_insertion_order() {
        let db = Database::in_memory().await.unwrap();
        let store = BookStore::new(db.connection());
        let first = store.insert_one("A").await.unwrap();
        let second = store.insert_one("B").await.unwrap();
        store.update_one(&second, "x").await.unwrap();
        store.update_one(&second, "y").await.unwrap();

        let books = store.find().await.unwrap();
        assert_eq!(
            books,
            vec![
                BookSummary {
                    id: first,
                    title: "A".into(),
                    commentcount: 0
                },
                BookSummary {
                    id: second,
                    title: "B".into(),
                    commentcount: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let db = Database::in_memory().await.unwrap();
        let store = BookStore::new(db.connection());
        let id = store.insert_one("A").await.unwrap();
        store.insert_one("B").await.unwrap();
        store.insert_one("C").await.unwrap();

        assert_eq!(store.delete_one(&id).await.unwrap(), 1);
        assert_eq!(store.delete_one(&id).await.unwrap(), 0);
        assert_eq!(store.delete_many().await.unwrap(), 2);
        assert_eq!(store.delete_many().await.unwrap(), 0);
        assert!(store.find().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_delete_counts_ignore_concurrent_inserts() {
        let db = std::sync::Arc::new(Database::in_memory().await.unwrap());

        let mut writers = Vec::new();
        for _ in 0..4 {
            let db = db.clone();
            writers.push(tokio::spawn(async move {
                let store = BookStore::new(db.connection());
                for i in 0..500 {
                    store.insert_one(&format!("book {i}")).await.unwrap();
                }
            }));
        }

        let mut deleters = Vec::new();
        for _ in 0..4 {
            let db = db.clone();
            deleters.push(tokio::spawn(async move {
                let store = BookStore::new(db.connection());
                let mut nonzero = 0;
                for _ in 0..500 {
                    if store.delete_one(&ObjectId::new()).await.unwrap() != 0 {
                        nonzero += 1;
                    }
                    if store.update_one(&ObjectId::new(), "lost").await.unwrap() != 0 {
                        nonzero += 1;
                    }
                }
                nonzero
            }));
        }

        for writer in writers {
            writer.await.unwrap();
        }
        for deleter in deleters {
            assert_eq!(deleter.await.unwrap(), 0);
        }

        let store = BookStore::new(db.connection());
        assert_eq!(store.delete_many().await.unwrap(), 2000);
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected_by_schema() {
        let db = Database::in_memory().await.unwrap();
        let store = BookStore::new(db.connection());

        assert!(store.insert_one("").await.is_err());
    }
}
