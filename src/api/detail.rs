//! Full entity detail retrieval
//!
//! An entity is three independently paginated resources: the profile, the
//! officer list and the filing history. [`fetch_entity`] only returns once all
//! of them have been retrieved, so a failure on any page surfaces as an error
//! instead of a half-filled record.

use crate::api::types::EntityRecord;
use crate::api::{ApiError, Gateway};
use serde_json::Value;

/// Retrieves profile, every officer page and every filing page for a company
///
/// # Arguments
///
/// * `gateway` - The registry gateway
/// * `company_number` - The company's registration number
/// * `page_size` - Items requested per officer/filing page
///
/// # Returns
///
/// * `Ok(EntityRecord)` - The complete entity
/// * `Err(ApiError)` - Any request failed; `ApiError::NotFound` when the
///   registry does not know the company
pub async fn fetch_entity(
    gateway: &Gateway,
    company_number: &str,
    page_size: u32,
) -> Result<EntityRecord, ApiError> {
    tracing::debug!("Getting profile for company {}", company_number);
    let profile = gateway.company_profile(company_number).await?;

    tracing::debug!("Getting officers for company {}", company_number);
    let officers = fetch_officers(gateway, company_number, page_size).await?;

    tracing::debug!("Getting filing history for company {}", company_number);
    let filing_history = fetch_filings(gateway, company_number, page_size).await?;

    tracing::debug!(
        "Retrieved company {}: {} officers, {} filings",
        company_number,
        officers.len(),
        filing_history.len()
    );

    Ok(EntityRecord {
        profile,
        officers,
        filing_history,
    })
}

async fn fetch_officers(
    gateway: &Gateway,
    company_number: &str,
    page_size: u32,
) -> Result<Vec<Value>, ApiError> {
    let first = gateway
        .company_officers(company_number, page_size, 0)
        .await?;

    let total = first.total_results;
    let step = first
        .items_per_page
        .filter(|n| *n > 0)
        .unwrap_or(u64::from(page_size));
    let step_u32 = u32::try_from(step).unwrap_or(page_size);

    let mut officers = first.items;
    if total > step {
        tracing::debug!(
            "Found {} officers for {}, retrieving additional pages",
            total,
            company_number
        );
        let mut start_index = step;
        while start_index < total {
            let page = gateway
                .company_officers(company_number, step_u32, start_index)
                .await?;
            if page.items.is_empty() {
                break;
            }
            officers.extend(page.items);
            start_index += step;
        }
    }

    Ok(officers)
}

async fn fetch_filings(
    gateway: &Gateway,
    company_number: &str,
    page_size: u32,
) -> Result<Vec<Value>, ApiError> {
    let first = gateway.filing_history(company_number, page_size, 0).await?;

    let total = first.total_count;
    let step = u64::from(page_size);

    let mut filings = first.items;
    if total > step {
        tracing::debug!(
            "Found {} filings for {}, retrieving additional pages",
            total,
            company_number
        );
        let mut start_index = step;
        while start_index < total {
            let page = gateway
                .filing_history(company_number, page_size, start_index)
                .await?;
            if page.items.is_empty() {
                break;
            }
            filings.extend(page.items);
            start_index += step;
        }
    }

    Ok(filings)
}
