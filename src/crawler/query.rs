//! Query and single-company modes
//!
//! Unlike the full crawl these modes keep no checkpoint: a failed entity is
//! logged and skipped, and re-running the same query skips whatever is
//! already complete on disk.

use crate::api::{fetch_entity, CompanySummary, Gateway};
use crate::crawler::buckets::PageCursor;
use crate::storage::{save_record, Repository};
use crate::ApiError;

/// Counts reported at the end of a query run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySummary {
    pub found: usize,
    pub saved: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

/// Collects up to `max_pages` pages of search results for `query`
pub async fn search_paginated(
    gateway: &Gateway,
    query: &str,
    max_pages: u32,
    page_size: u32,
) -> Result<Vec<CompanySummary>, ApiError> {
    let mut cursor = PageCursor::containing(0, 0, page_size);
    let mut companies = Vec::new();

    for page_number in 0..max_pages {
        let page = gateway
            .search_companies(query, page_size, cursor.offset)
            .await?;

        if page_number == 0 {
            tracing::info!("Found {} results for query: {}", page.total_results, query);
        }
        if page.items.is_empty() {
            tracing::info!("No more items found, stopping pagination");
            break;
        }

        companies.extend(page.items);
        cursor.advance();

        if cursor.is_past(page.total_results) {
            tracing::info!("Reached end of results");
            break;
        }
    }

    Ok(companies)
}

/// Searches the registry and saves every matching company not yet on disk
///
/// Pagination errors are returned; per-company errors are logged and
/// counted in [`QuerySummary::failed`].
pub async fn scrape_by_query<R: Repository>(
    gateway: &Gateway,
    repository: &mut R,
    query: &str,
    max_pages: u32,
    page_size: u32,
) -> Result<QuerySummary, ApiError> {
    tracing::info!("Searching for companies with query: {}", query);
    let companies = search_paginated(gateway, query, max_pages, page_size).await?;

    let mut summary = QuerySummary {
        found: companies.len(),
        ..Default::default()
    };

    if companies.is_empty() {
        tracing::warn!("No companies found for query: {}", query);
        return Ok(summary);
    }
    tracing::info!(
        "Found {} companies. Retrieving detailed information...",
        companies.len()
    );

    for company in &companies {
        let Some(company_number) = company.company_number() else {
            tracing::warn!("Skipping company without company number: {:?}", company.title);
            continue;
        };

        if repository.is_complete(company_number) {
            tracing::info!("Company {} already scraped, skipping", company_number);
            summary.skipped_existing += 1;
            continue;
        }

        let record = match fetch_entity(gateway, company_number, page_size).await {
            Ok(record) => record,
            Err(e) if e.is_interrupted() => return Err(e),
            Err(e) => {
                tracing::error!("Error processing company {}: {}", company_number, e);
                summary.failed += 1;
                continue;
            }
        };

        match save_record(repository, &record) {
            Ok(_) => summary.saved += 1,
            Err(e) => {
                tracing::error!("Error saving company {}: {}", company_number, e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

/// Fetches and saves a single company
///
/// # Returns
///
/// * `Ok(String)` - The company number the record was saved under
/// * `Err(RegistryError)` - The fetch or the save failed
pub async fn scrape_company<R: Repository>(
    gateway: &Gateway,
    repository: &mut R,
    company_number: &str,
    page_size: u32,
) -> crate::Result<String> {
    tracing::info!("Scraping specific company: {}", company_number);
    let record = fetch_entity(gateway, company_number.trim(), page_size).await?;
    let saved_as = save_record(repository, &record)?;
    tracing::info!("Completed scraping company {}", saved_as);
    Ok(saved_as)
}
