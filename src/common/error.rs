use thiserror::Error;

use super::types::PageId;
use crate::tuple::DataType;

/// Storage layer error types
#[derive(Error, Debug)]
pub enum HeapDbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Page {page_number} out of range, file has {num_pages} pages")]
    PageOutOfRange { page_number: i32, num_pages: usize },

    #[error("Field {index} expects {expected}, found {found}")]
    TypeMismatch {
        index: usize,
        expected: DataType,
        found: String,
    },

    #[error("Page {0} has no free slot")]
    PageFull(PageId),

    #[error("Invalid page size: expected {expected} bytes, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Invalid page ID: {0}")]
    InvalidPageId(String),

    #[error("{0}")]
    Db(String),
}

pub type Result<T> = std::result::Result<T, HeapDbError>;
