//! Books Module
//!
//! The book catalog: a `books` collection where each document has a title and an
//! append-only list of comments.
//!
//! # Features
//!
//! - Collection-style store over libsql (`find`, `find_one`, `insert_one`,
//!   `update_one`, `delete_one`, `delete_many`)
//! - HTTP handlers and routes for `/books` and `/books/:id`
//! - Database migrations included
//!
//! # Usage
//!
//! ```rust,ignore
//! use bibliotek_books::books;
//!
//! let app = Router::new()
//!     .merge(books::routes())
//!     .with_state(app_state);
//!
//! let store = books::BookStore::new(connection);
//! let id = store.insert_one("NodeJS").await?;
//! ```

mod handler;
mod routes;
mod store;

pub use routes::routes;
pub use store::*;

/// Returns the migrations for the books module.
pub fn migrations() -> &'static [(&'static str, &'static str)] {
    &[("books_001_schema.sql", include_str!("migrations/001_schema.sql"))]
}
