//! Resume pointer derivation
//!
//! A resume pointer says where a crawl starts: which bucket and which absolute
//! position inside it. Only a name-only request, with no position, falls back
//! to a title threshold; search results are ordered by relevance, so a title
//! filter applied after a known position would drop entities.

use crate::crawler::checkpoint::Checkpoint;

/// Single-use title filter applied inside the resume bucket
///
/// Items whose title sorts (case-insensitively) before the threshold are
/// skipped; the first item at or after it consumes the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeThreshold {
    title: String,
    key: String,
}

impl ResumeThreshold {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            key: title.to_lowercase(),
        }
    }

    /// The title as it was recorded
    pub fn title(&self) -> &str {
        &self.title
    }

    /// True when `title` sorts at or after the threshold
    pub fn is_reached_by(&self, title: &str) -> bool {
        title.to_lowercase() >= self.key
    }
}

/// Where a crawl starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePointer {
    pub bucket_index: usize,
    pub offset: u64,
    pub threshold: Option<ResumeThreshold>,
    pub total_processed: u64,
}

impl ResumePointer {
    /// Start of the first bucket
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn is_fresh(&self) -> bool {
        self.bucket_index == 0 && self.offset == 0 && self.threshold.is_none()
    }

    /// Derives the pointer from a saved checkpoint
    ///
    /// A completed checkpoint starts a fresh crawl. Otherwise the bucket is
    /// the checkpoint's `current_char`, falling back to the first character
    /// of `last_company`, then to the first bucket. The position alone
    /// decides which items are skipped.
    pub fn from_checkpoint(checkpoint: &Checkpoint, buckets: &[String]) -> Self {
        if checkpoint.is_completed() {
            return Self::fresh();
        }

        let bucket_index = checkpoint
            .current_char
            .as_deref()
            .and_then(|token| bucket_position(buckets, token))
            .or_else(|| {
                checkpoint
                    .last_company
                    .as_deref()
                    .and_then(|title| bucket_for_title(buckets, title))
            })
            .unwrap_or(0);

        Self {
            bucket_index,
            offset: checkpoint.last_index,
            threshold: None,
            total_processed: checkpoint.total_processed,
        }
    }

    /// Builds the pointer from an explicit position given by the operator
    ///
    /// The bucket is chosen from the first character of `company`, the first
    /// bucket otherwise. `company` only filters by title when `index` is 0.
    pub fn from_request(index: u64, company: Option<&str>, buckets: &[String]) -> Self {
        let company = company.map(str::trim).filter(|c| !c.is_empty());

        Self {
            bucket_index: company
                .and_then(|title| bucket_for_title(buckets, title))
                .unwrap_or(0),
            offset: index,
            threshold: company
                .filter(|_| index == 0)
                .map(ResumeThreshold::new),
            total_processed: 0,
        }
    }

    /// Chooses the starting point for a full crawl
    ///
    /// `fresh` ignores everything; an explicit index or company overrides the
    /// checkpoint; otherwise the checkpoint is used when there is one.
    pub fn resolve(
        checkpoint: Option<&Checkpoint>,
        index: Option<u64>,
        company: Option<&str>,
        fresh: bool,
        buckets: &[String],
    ) -> Self {
        if fresh {
            return Self::fresh();
        }
        if index.is_some_and(|i| i > 0) || company.is_some() {
            return Self::from_request(index.unwrap_or(0), company, buckets);
        }
        checkpoint
            .map(|c| Self::from_checkpoint(c, buckets))
            .unwrap_or_default()
    }
}

fn bucket_position(buckets: &[String], token: &str) -> Option<usize> {
    buckets.iter().position(|b| b.eq_ignore_ascii_case(token))
}

fn bucket_for_title(buckets: &[String], title: &str) -> Option<usize> {
    let first = title.chars().next()?.to_uppercase().to_string();
    bucket_position(buckets, &first)
}
