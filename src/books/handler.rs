//! HTTP Handlers for the Books API

use axum::{
    Json,
    extract::{Path, State},
};

use super::BookStore;
use crate::api::Payload;
use crate::error::BookError;
use crate::handler::AppState;
use crate::model::{Book, BookSummary, NewBook, NewComment, required};
use crate::object_id::ObjectId;

fn parse_id(raw: &str) -> Result<ObjectId, BookError> {
    raw.parse().map_err(|_| BookError::NotFound)
}

pub async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<BookSummary>>, BookError> {
    let store = BookStore::new(state.db.connection());
    let books = store.find().await?;

    tracing::info!(count = books.len(), "listed books");
    Ok(Json(books))
}

pub async fn create_book(
    State(state): State<AppState>,
    Payload(input): Payload<NewBook>,
) -> Result<Json<Book>, BookError> {
    let title = required(input.title).ok_or(BookError::MissingField("title"))?;
    let store = BookStore::new(state.db.connection());

    let id = store.insert_one(&title).await?;
    let book = store.find_one(&id).await?.ok_or(BookError::NotFound)?;

    tracing::info!(book_id = %id, "created book");
    Ok(Json(book))
}

pub async fn delete_all_books(State(state): State<AppState>) -> Result<&'static str, BookError> {
    let store = BookStore::new(state.db.connection());

    let deleted = store.delete_many().await?;
    if deleted == 0 {
        return Err(BookError::NothingDeleted);
    }

    tracing::info!(deleted, "deleted all books");
    Ok("complete delete successful")
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Book>, BookError> {
    let id = parse_id(&id)?;
    let store = BookStore::new(state.db.connection());

    let book = store.find_one(&id).await?.ok_or(BookError::NotFound)?;
    Ok(Json(book))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Payload(input): Payload<NewComment>,
) -> Result<Json<Book>, BookError> {
    let id = parse_id(&id)?;
    let store = BookStore::new(state.db.connection());

    if store.find_one(&id).await?.is_none() {
        return Err(BookError::NotFound);
    }
    let comment = required(input.comment).ok_or(BookError::MissingField("comment"))?;

    if store.update_one(&id, &comment).await? == 0 {
        return Err(BookError::CommentNotAdded);
    }

    // A concurrent delete can land between the append and this read.
    let book = store.find_one(&id).await?.ok_or(BookError::NotFound)?;

    tracing::info!(book_id = %id, comments = book.comments.len(), "added comment");
    Ok(Json(book))
}

pub async fn delete_book(State(state): State<AppState>, Path(id): Path<String>) -> Result<&'static str, BookError> {
    let id = parse_id(&id)?;
    let store = BookStore::new(state.db.connection());

    if store.delete_one(&id).await? == 0 {
        return Err(BookError::NotFound);
    }

    tracing::info!(book_id = %id, "deleted book");
    Ok("delete successful")
}
