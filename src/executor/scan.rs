use crate::types::{error::DatabaseError, row::Row};

/// Row source pulled one row at a time
pub trait Scanner {
    fn scan(&mut self) -> Result<Option<Row>, DatabaseError>;

    fn reset(&mut self) -> Result<(), DatabaseError>;

    /// Up to `batch_size` rows; fewer only when the source is exhausted
    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<Row>, DatabaseError> {
        let mut rows = Vec::new();
        while rows.len() < batch_size {
            match self.scan()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    fn scan_all(&mut self) -> Result<Vec<Row>, DatabaseError> {
        self.scan_batch(usize::MAX)
    }
}

pub struct ScanIterator<S: Scanner> {
    scanner: S,
}

impl<S: Scanner> ScanIterator<S> {
    pub fn new(scanner: S) -> Self {
        Self { scanner }
    }
}

impl<S: Scanner> Iterator for ScanIterator<S> {
    type Item = Result<Row, DatabaseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scanner.scan().transpose()
    }
}
