//! Content extraction: keep only the table elements of a content list.

use crate::model::ContentElement;
use tracing::debug;

/// Return the table elements of `elements`, in their original order and
/// otherwise untouched.
pub fn extract_tables(elements: Vec<ContentElement>) -> Vec<ContentElement> {
    let total = elements.len();
    let tables: Vec<ContentElement> = elements.into_iter().filter(|e| e.is_table()).collect();
    debug!("Kept {} table elements out of {}", tables.len(), total);
    tables
}
