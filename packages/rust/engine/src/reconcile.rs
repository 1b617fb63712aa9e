//! Exhibitor reconciliation: create / fill-gap merge / skip.
//!
//! Exhibitor data arrives incrementally and redundantly across pages and
//! runs, so reconciliation must be idempotent and must never destroy
//! previously captured detail with a later, less complete scrape. Scalar
//! fields follow a fill-gap policy (write only into empty fields); contacts
//! dedup on lowercased non-empty email.

use chrono::Utc;
use expoharvest_shared::{
    Contact, Exhibitor, ExhibitorId, ExpoHarvestError, RawContact, RawExhibitor, ReconcileOutcome,
    Result, TradeShowId,
};
use expoharvest_storage::Storage;
use tracing::debug;

/// Reconcile one raw record against stored exhibitors for `(show, scope)`.
///
/// Persistence errors bubble up to the caller, which records them as
/// per-record failures; a missing company name is rejected the same way.
pub async fn reconcile(
    storage: &Storage,
    raw: &RawExhibitor,
    trade_show_id: &TradeShowId,
    scope_id: &str,
) -> Result<ReconcileOutcome> {
    let company_name = raw
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ExpoHarvestError::validation("record has no companyName"))?;

    let existing = storage
        .find_exhibitor(trade_show_id, scope_id, company_name)
        .await?;

    match existing {
        None => {
            let mut contacts = Vec::new();
            merge_contacts(&mut contacts, &raw.contacts);

            let exhibitor = Exhibitor {
                id: ExhibitorId::new(),
                trade_show_id: *trade_show_id,
                scope_id: scope_id.to_string(),
                company_name: company_name.to_string(),
                booth_no: clean(&raw.booth_no),
                website: clean(&raw.website),
                company_email: clean(&raw.company_email),
                location: clean(&raw.location),
                contacts,
                extracted_at: Utc::now(),
            };
            storage.insert_exhibitor(&exhibitor).await?;
            debug!(company = %exhibitor.company_name, "created exhibitor");
            Ok(ReconcileOutcome::Created)
        }
        Some(mut exhibitor) => {
            let mut changed = false;
            changed |= fill_gap(&mut exhibitor.website, raw.website.as_deref());
            changed |= fill_gap(&mut exhibitor.company_email, raw.company_email.as_deref());
            changed |= fill_gap(&mut exhibitor.booth_no, raw.booth_no.as_deref());
            changed |= fill_gap(&mut exhibitor.location, raw.location.as_deref());
            changed |= merge_contacts(&mut exhibitor.contacts, &raw.contacts);

            if changed {
                storage.update_exhibitor(&exhibitor).await?;
                debug!(company = %exhibitor.company_name, "merged exhibitor");
                Ok(ReconcileOutcome::Merged)
            } else {
                Ok(ReconcileOutcome::Skipped)
            }
        }
    }
}

/// Trimmed value of an optional raw field, empty string when absent.
fn clean(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/// Fill-gap merge for one scalar field: write only when the stored value is
/// empty and the incoming one is not. First write wins for populated fields.
fn fill_gap(stored: &mut String, incoming: Option<&str>) -> bool {
    match incoming.map(str::trim) {
        Some(value) if stored.is_empty() && !value.is_empty() => {
            *stored = value.to_string();
            true
        }
        _ => false,
    }
}

/// Append incoming contacts whose lowercased non-empty email is not already
/// present. Contacts without an email are never considered duplicates and
/// are always appended. Returns true when anything was added.
fn merge_contacts(stored: &mut Vec<Contact>, incoming: &[RawContact]) -> bool {
    let mut seen: Vec<String> = stored
        .iter()
        .filter(|c| !c.email.is_empty())
        .map(|c| c.email.to_lowercase())
        .collect();

    let mut changed = false;
    for raw in incoming {
        let contact = Contact {
            name: clean(&raw.name),
            email: clean(&raw.email),
            phone: clean(&raw.phone),
            title: clean(&raw.title),
        };
        if !contact.email.is_empty() {
            let key = contact.email.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
        }
        stored.push(contact);
        changed = true;
    }
    changed
}
