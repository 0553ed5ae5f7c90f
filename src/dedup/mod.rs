//! Deduplicating append: hash the natural key, skip if seen, else append.
//!
//! Every writer in the pipeline goes through the same three pieces: a digest
//! over the record's natural key, an index of digests rebuilt from the store
//! at run start, and a gate that appends only what the index has not seen.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::models::SheetRecord;
use crate::sheets::{StoreError, TabularStore, ValueInputOption};

const KEY_SEPARATOR: &str = "|";

/// Digest over the designated natural-key fields. `None` when every field is
/// empty; the caller decides whether that means reject (candidates) or
/// fall back to a whole-row digest (historical rows).
pub fn digest_fields(fields: &[String]) -> Option<String> {
    if fields.iter().all(|f| f.trim().is_empty()) {
        return None;
    }
    let joined = fields
        .iter()
        .map(|f| f.trim())
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR);
    Some(format!("{:x}", md5::compute(joined)))
}

/// Best-effort digest over an entire row, for rows with no usable key.
pub fn digest_whole_row(row: &[String]) -> String {
    format!("{:x}", md5::compute(row.join(KEY_SEPARATOR)))
}

/// Set of digests for every natural key already persisted.
///
/// Built once per run per worksheet and only ever grows; the store itself is
/// the source of truth for the next run.
#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    /// Load the index from the store. Skips the header row; short rows are
    /// padded with empty strings rather than rejected. A historical row whose
    /// key columns are all empty still occupies the index via a whole-row
    /// digest, with a data-quality warning.
    ///
    /// Store errors propagate: scraping without a dedup baseline would
    /// silently reintroduce duplicates.
    pub async fn load<S: TabularStore + ?Sized>(
        store: &S,
        worksheet: &str,
        key_columns: &[usize],
    ) -> Result<Self, StoreError> {
        let rows = store.read_all_rows(worksheet).await?;

        let mut seen = HashSet::new();
        for row in rows.iter().skip(1) {
            let fields: Vec<String> = key_columns
                .iter()
                .map(|&col| row.get(col).cloned().unwrap_or_default())
                .collect();

            match digest_fields(&fields) {
                Some(digest) => {
                    seen.insert(digest);
                }
                None => {
                    warn!(worksheet, "historical row has empty natural key, indexing whole row");
                    seen.insert(digest_whole_row(row));
                }
            }
        }

        debug!(worksheet, keys = seen.len(), "dedup index loaded");
        Ok(Self { seen })
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.seen.contains(digest)
    }

    pub fn insert(&mut self, digest: String) {
        self.seen.insert(digest);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// What the gate did with a candidate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    Duplicate,
    /// Candidate had no natural key and was rejected before hashing.
    MissingKey,
}

/// Decides write-or-skip for each candidate record against one worksheet.
///
/// The digest is inserted into the index only after a confirmed append, so a
/// failed write leaves the index consistent with the store and the record can
/// be retried later without looking like a duplicate of itself.
pub struct AppendGate<'a> {
    store: &'a dyn TabularStore,
    worksheet: &'a str,
    index: DedupIndex,
}

impl<'a> AppendGate<'a> {
    pub fn new(store: &'a dyn TabularStore, worksheet: &'a str, index: DedupIndex) -> Self {
        Self {
            store,
            worksheet,
            index,
        }
    }

    /// Offer one record. A transient append failure is retried once; a second
    /// failure propagates and the index is left untouched.
    pub async fn offer<R: SheetRecord>(&mut self, record: &R) -> Result<AppendOutcome, StoreError> {
        let fields = record.key_fields();
        let Some(digest) = digest_fields(&fields) else {
            warn!(
                worksheet = self.worksheet,
                "record rejected: empty natural key"
            );
            return Ok(AppendOutcome::MissingKey);
        };

        if self.index.contains(&digest) {
            debug!(
                worksheet = self.worksheet,
                key = %fields.join(KEY_SEPARATOR),
                "duplicate record skipped"
            );
            return Ok(AppendOutcome::Duplicate);
        }

        let row = record.to_row();
        if let Err(first) = self
            .store
            .append_row(self.worksheet, &row, ValueInputOption::UserEntered)
            .await
        {
            warn!(
                worksheet = self.worksheet,
                "append failed, retrying once: {first}"
            );
            self.store
                .append_row(self.worksheet, &row, ValueInputOption::UserEntered)
                .await?;
        }

        self.index.insert(digest);
        Ok(AppendOutcome::Appended)
    }

    pub fn index(&self) -> &DedupIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComplaintRecord, ReviewRecord};
    use crate::sheets::MemoryStore;

    fn complaint(id: &str) -> ComplaintRecord {
        ComplaintRecord {
            outlet_id: "121907".to_string(),
            complaint_id: id.to_string(),
            status: "UNRESOLVED".to_string(),
            ..Default::default()
        }
    }

    fn review(order_id: &str) -> ReviewRecord {
        ReviewRecord {
            order_id: order_id.to_string(),
            ..Default::default()
        }
    }

    fn complaint_header() -> Vec<String> {
        vec!["Outlet ID".to_string(), "Complaint ID".to_string()]
    }

    #[test]
    fn digests_are_deterministic_and_distinct() {
        let a = digest_fields(&["778899".to_string()]).unwrap();
        let b = digest_fields(&["778899".to_string()]).unwrap();
        let c = digest_fields(&["778900".to_string()]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn composite_keys_do_not_collide_across_field_boundaries() {
        let a = digest_fields(&["12".to_string(), "34".to_string()]).unwrap();
        let b = digest_fields(&["123".to_string(), "4".to_string()]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn all_empty_key_has_no_digest() {
        assert_eq!(digest_fields(&[String::new(), "  ".to_string()]), None);
    }

    #[tokio::test]
    async fn loader_skips_header_and_tolerates_short_rows() {
        let store = MemoryStore::new();
        store.seed(
            "Complaints",
            vec![
                complaint_header(),
                vec!["121907".to_string(), "778899".to_string()],
                // short row: key column missing entirely
                vec!["121907".to_string()],
            ],
        );

        let index = DedupIndex::load(&store, "Complaints", ComplaintRecord::KEY_COLUMNS)
            .await
            .unwrap();

        assert!(index.contains(&digest_fields(&["778899".to_string()]).unwrap()));
        // the short row fell back to a whole-row digest
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn existing_complaint_id_is_skipped() {
        let store = MemoryStore::new();
        store.seed(
            "Complaints",
            vec![
                complaint_header(),
                vec!["999".to_string(), "778899".to_string()],
            ],
        );

        let index = DedupIndex::load(&store, "Complaints", ComplaintRecord::KEY_COLUMNS)
            .await
            .unwrap();
        let mut gate = AppendGate::new(&store, "Complaints", index);

        // same complaint id, different other fields
        let outcome = gate.offer(&complaint("778899")).await.unwrap();

        assert_eq!(outcome, AppendOutcome::Duplicate);
        assert_eq!(store.rows("Complaints").len(), 2);
    }

    #[tokio::test]
    async fn novel_records_append_in_order() {
        let store = MemoryStore::new();

        let index = DedupIndex::load(&store, "Reviews", ReviewRecord::KEY_COLUMNS)
            .await
            .unwrap();
        let mut gate = AppendGate::new(&store, "Reviews", index);

        assert_eq!(gate.offer(&review("A1")).await.unwrap(), AppendOutcome::Appended);
        assert_eq!(gate.offer(&review("A2")).await.unwrap(), AppendOutcome::Appended);

        let rows = store.rows("Reviews");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "A1");
        assert_eq!(rows[1][0], "A2");
    }

    #[tokio::test]
    async fn empty_key_is_rejected_before_hashing() {
        let store = MemoryStore::new();
        let mut gate = AppendGate::new(&store, "Complaints", DedupIndex::default());

        let outcome = gate.offer(&complaint("")).await.unwrap();

        assert_eq!(outcome, AppendOutcome::MissingKey);
        assert!(store.rows("Complaints").is_empty());
        assert!(gate.index().is_empty());
    }

    #[tokio::test]
    async fn digest_indexed_only_after_successful_retry() {
        let store = MemoryStore::new();
        store.fail_appends(1);
        let mut gate = AppendGate::new(&store, "Reviews", DedupIndex::default());

        let record = review("A1");
        assert_eq!(gate.offer(&record).await.unwrap(), AppendOutcome::Appended);

        assert_eq!(store.rows("Reviews").len(), 1);
        assert_eq!(gate.index().len(), 1);

        // offering the same record again is now a duplicate
        assert_eq!(gate.offer(&record).await.unwrap(), AppendOutcome::Duplicate);
        assert_eq!(store.rows("Reviews").len(), 1);
    }

    #[tokio::test]
    async fn two_consecutive_failures_leave_index_clean() {
        let store = MemoryStore::new();
        store.fail_appends(2);
        let mut gate = AppendGate::new(&store, "Reviews", DedupIndex::default());

        let record = review("A1");
        assert!(gate.offer(&record).await.is_err());
        assert!(gate.index().is_empty());

        // retried on a later pass, not mistaken for a duplicate of itself
        assert_eq!(gate.offer(&record).await.unwrap(), AppendOutcome::Appended);
        assert_eq!(store.rows("Reviews").len(), 1);
    }

    #[tokio::test]
    async fn rerunning_the_same_batch_is_idempotent() {
        let store = MemoryStore::new();
        let batch = [review("A1"), review("A2")];

        for _ in 0..2 {
            let index = DedupIndex::load(&store, "Reviews", ReviewRecord::KEY_COLUMNS)
                .await
                .unwrap();
            let mut gate = AppendGate::new(&store, "Reviews", index);
            for record in &batch {
                gate.offer(record).await.unwrap();
            }
        }

        assert_eq!(store.rows("Reviews").len(), 2);
    }
}
