use crate::object_id::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub comments: Vec<String>,
}

/// Listing view of a book: the comments are reduced to their count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub commentcount: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewBook {
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewComment {
    pub comment: Option<String>,
}

/// Returns the field only when it is present and non-empty.
pub fn required(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_rejects_absent_and_empty() {
        assert_eq!(required(None), None);
        assert_eq!(required(Some(String::new())), None);
        assert_eq!(required(Some(" ".into())), Some(" ".to_string()));
    }

    #[test]
    fn test_book_wire_shape() {
        let id: ObjectId = "65a1f0c2b3d4e5f60718293a".parse().unwrap();
        let book = Book {
            id,
            title: "NodeJS".into(),
            comments: vec!["comment to book".into()],
        };
        assert_eq!(
            serde_json::to_value(&book).unwrap(),
            json!({ "_id": "65a1f0c2b3d4e5f60718293a", "title": "NodeJS", "comments": ["comment to book"] })
        );
    }
}
