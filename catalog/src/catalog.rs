//! The local read model of the remote collection.

use bookshelf_core::book::BookRecord;
use std::ops::Deref;
use std::sync::Arc;

/// An immutable, ordered snapshot of the remote book collection
///
/// Cloning is cheap: clones share the same records. A new `Catalog` is built
/// for every remote notification and replaces the previous one wholesale.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    books: Arc<Vec<BookRecord>>,
}

impl Catalog {
    /// Wraps `books`, keeping their order
    #[must_use]
    pub fn new(books: Vec<BookRecord>) -> Self {
        Self {
            books: Arc::new(books),
        }
    }

    /// The empty catalog
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up a book by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BookRecord> {
        self.books.iter().find(|book| book.has_id(id))
    }

    /// Number of books
    #[must_use]
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Checks if the catalog holds no books
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// The books as a slice, in catalog order
    #[must_use]
    pub fn as_slice(&self) -> &[BookRecord] {
        &self.books
    }

    /// Checks if both catalogs are the same shared snapshot
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.books, &other.books)
    }
}

impl Deref for Catalog {
    type Target = [BookRecord];

    fn deref(&self) -> &[BookRecord] {
        self.as_slice()
    }
}

impl From<Vec<BookRecord>> for Catalog {
    fn from(books: Vec<BookRecord>) -> Self {
        Self::new(books)
    }
}

impl FromIterator<BookRecord> for Catalog {
    fn from_iter<I: IntoIterator<Item = BookRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a BookRecord;
    type IntoIter = std::slice::Iter<'a, BookRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.books.iter()
    }
}
