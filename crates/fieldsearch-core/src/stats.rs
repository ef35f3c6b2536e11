//! Typed view over the positional field-statistics buffer.
//!
//! Layout v1, all `u32`:
//!
//! ```text
//! [p, c, n, a[0..c], l[0..c], x[0..p][0..c][3]]
//! ```
//!
//! `p` phrases, `c` columns, `n` live rows, `a` integer average words per
//! column, `l` this row's words per column, and per phrase/column the
//! triple (hits in this row, hits in all rows, rows with a hit).
//! The buffer is validated once in [`FieldStats::parse`]; accessors never
//! index out of bounds afterwards.

use crate::error::IndexError;
use crate::types::WEIGHTED_FIELD_COUNT;

/// Bumped whenever the positional layout changes.
pub const LAYOUT_VERSION: u32 = 1;

const HEADER_LEN: usize = 3;
const PHRASE_CELL_LEN: usize = 3;

/// Expected buffer length for `phrases` phrases over `columns` columns.
pub fn buffer_len(phrases: usize, columns: usize) -> usize {
    HEADER_LEN + 2 * columns + PHRASE_CELL_LEN * phrases * columns
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhraseColumnStats {
    pub hits_in_row: u32,
    pub hits_in_all_rows: u32,
    pub rows_with_hit: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldStats<'a> {
    buf: &'a [u32],
    phrases: usize,
    columns: usize,
}

impl<'a> FieldStats<'a> {
    pub fn parse(buf: &'a [u32]) -> Result<Self, IndexError> {
        if buf.len() < HEADER_LEN {
            return Err(IndexError::Storage(format!(
                "field statistics buffer too short for header: {} words",
                buf.len()
            )));
        }
        let phrases = buf[0] as usize;
        let columns = buf[1] as usize;
        if columns != WEIGHTED_FIELD_COUNT {
            return Err(IndexError::Storage(format!(
                "field statistics layout v{LAYOUT_VERSION} expects {WEIGHTED_FIELD_COUNT} columns, buffer declares {columns}"
            )));
        }
        let expected = buffer_len(phrases, columns);
        if buf.len() != expected {
            return Err(IndexError::Storage(format!(
                "field statistics buffer has {} words, {phrases} phrases over {columns} columns need {expected}",
                buf.len()
            )));
        }
        Ok(Self { buf, phrases, columns })
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    pub fn row_count(&self) -> u32 {
        self.buf[2]
    }

    pub fn average_words(&self, column: usize) -> u32 {
        self.buf[HEADER_LEN + column.min(self.columns - 1)]
    }

    pub fn row_words(&self, column: usize) -> u32 {
        self.buf[HEADER_LEN + self.columns + column.min(self.columns - 1)]
    }

    /// Per-column statistics of one phrase. `phrase` must be `< phrase_count()`.
    pub fn phrase(&self, phrase: usize) -> Option<[PhraseColumnStats; WEIGHTED_FIELD_COUNT]> {
        if phrase >= self.phrases {
            return None;
        }
        let start = HEADER_LEN + 2 * self.columns + phrase * self.columns * PHRASE_CELL_LEN;
        let mut out = [PhraseColumnStats::default(); WEIGHTED_FIELD_COUNT];
        for (column, cell) in out.iter_mut().enumerate() {
            let at = start + column * PHRASE_CELL_LEN;
            *cell = PhraseColumnStats {
                hits_in_row: self.buf[at],
                hits_in_all_rows: self.buf[at + 1],
                rows_with_hit: self.buf[at + 2],
            };
        }
        Some(out)
    }
}

/// Assembles a buffer in the v1 layout, one row at a time.
#[derive(Debug, Clone)]
pub struct FieldStatsBuilder {
    buf: Vec<u32>,
}

impl FieldStatsBuilder {
    pub fn new(
        row_count: u32,
        average_words: [u32; WEIGHTED_FIELD_COUNT],
        row_words: [u32; WEIGHTED_FIELD_COUNT],
    ) -> Self {
        let mut buf = Vec::with_capacity(buffer_len(1, WEIGHTED_FIELD_COUNT));
        buf.extend([0, WEIGHTED_FIELD_COUNT as u32, row_count]);
        buf.extend(average_words);
        buf.extend(row_words);
        Self { buf }
    }

    pub fn push_phrase(&mut self, columns: &[PhraseColumnStats; WEIGHTED_FIELD_COUNT]) {
        for cell in columns {
            self.buf.extend([cell.hits_in_row, cell.hits_in_all_rows, cell.rows_with_hit]);
        }
        self.buf[0] += 1;
    }

    pub fn finish(self) -> Vec<u32> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(hits_in_row: u32, hits_in_all_rows: u32, rows_with_hit: u32) -> PhraseColumnStats {
        PhraseColumnStats { hits_in_row, hits_in_all_rows, rows_with_hit }
    }

    #[test]
    fn builder_output_parses_back_positionally() {
        let mut builder = FieldStatsBuilder::new(7, [3, 2, 1, 0, 9], [4, 0, 1, 0, 2]);
        builder.push_phrase(&[cell(1, 2, 2), cell(0, 0, 0), cell(0, 1, 1), cell(0, 0, 0), cell(5, 6, 3)]);
        let buf = builder.finish();
        assert_eq!(buf.len(), buffer_len(1, 5));
        assert_eq!(&buf[..3], &[1, 5, 7]);

        let stats = FieldStats::parse(&buf).expect("valid buffer");
        assert_eq!(stats.phrase_count(), 1);
        assert_eq!(stats.row_count(), 7);
        assert_eq!(stats.average_words(4), 9);
        assert_eq!(stats.row_words(0), 4);
        let phrase = stats.phrase(0).expect("phrase 0");
        assert_eq!(phrase[4], cell(5, 6, 3));
        assert!(stats.phrase(1).is_none());
    }

    #[test]
    fn truncated_buffer_is_a_storage_error() {
        let mut builder = FieldStatsBuilder::new(2, [1; 5], [1; 5]);
        builder.push_phrase(&[cell(1, 1, 1); 5]);
        let mut buf = builder.finish();
        buf.pop();
        assert!(matches!(FieldStats::parse(&buf), Err(IndexError::Storage(_))));
    }

    #[test]
    fn declared_column_count_must_match_layout() {
        let mut buf = vec![0, 4, 1];
        buf.extend([0; 8]);
        assert!(matches!(FieldStats::parse(&buf), Err(IndexError::Storage(_))));
        assert!(matches!(FieldStats::parse(&[1, 5]), Err(IndexError::Storage(_))));
    }

    #[test]
    fn oversized_phrase_count_does_not_read_past_the_end() {
        let mut buf = FieldStatsBuilder::new(1, [1; 5], [1; 5]).finish();
        buf[0] = 1000;
        assert!(FieldStats::parse(&buf).is_err());
    }
}
