//! Derived views over the store: fixed-predicate queries, joins along the
//! informal foreign keys, and dashboard statistics.
//!
//! Nothing here writes. Joins attach related records to a copy of the base
//! record and tolerate dangling references.

use chrono::{DateTime, Datelike, Duration, Utc};
use log::warn;
use serde::Serialize;

use crate::collection::Collection;
use crate::error::Result;
use crate::record::{parse_timestamp, Record};
use crate::store::CollectionStore;

/// A project with the tasks whose `project_id` points at it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectWithTasks {
    #[serde(flatten)]
    pub project: Record,
    pub tasks: Vec<Record>,
}

/// A contact with everything that references it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactHistory {
    #[serde(flatten)]
    pub contact: Record,
    pub deals: Vec<Record>,
    pub projects: Vec<Record>,
    pub invoices: Vec<Record>,
    pub appointments: Vec<Record>,
}

/// An invoice with its client and, when it names one, its project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceWithClient {
    #[serde(flatten)]
    pub invoice: Record,
    pub client: Option<Record>,
    pub project: Option<Record>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_contacts: usize,
    pub active_projects: usize,
    pub pending_tasks: usize,
    pub unpaid_invoices: usize,
    pub total_revenue: f64,
}

fn field_equals(record: &Record, field: &str, expected: &str) -> bool {
    record.str_field(field) == Some(expected)
}

fn date_field(record: &Record, field: &str) -> Option<DateTime<Utc>> {
    record.str_field(field).and_then(parse_timestamp)
}

/// `now + days`, saturating at the limits of `DateTime<Utc>`.
fn window_end(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    match Duration::try_days(days).and_then(|span| now.checked_add_signed(span)) {
        Some(end) => end,
        None => {
            warn!("Event window of {days} days is out of range, clamping");
            if days < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            }
        }
    }
}

/// Numeric `total`, or zero when absent or not a number.
fn invoice_total(invoice: &Record) -> f64 {
    invoice.f64_field("total").unwrap_or(0.0)
}

impl CollectionStore {
    // ============================================
    // SPECIALIZED QUERIES
    // ============================================

    /// Contacts whose `tags` array contains `tag` exactly.
    pub fn contacts_by_tag(&self, tag: &str) -> Result<Vec<Record>> {
        self.filter(Collection::Contacts, |contact| {
            contact
                .get("tags")
                .and_then(|tags| tags.as_array())
                .map(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
                .unwrap_or(false)
        })
    }

    pub fn project_tasks(&self, project_id: &str) -> Result<Vec<Record>> {
        self.filter(Collection::Tasks, |task| field_equals(task, "project_id", project_id))
    }

    pub fn invoices_by_status(&self, status: &str) -> Result<Vec<Record>> {
        self.filter(Collection::Invoices, |invoice| field_equals(invoice, "status", status))
    }

    /// Time entries whose `date` lies in `[start, end]`. Entries without a
    /// parseable date are excluded.
    pub fn time_entries_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Record>> {
        self.filter(Collection::TimeEntries, |entry| {
            date_field(entry, "date")
                .map(|date| date >= start && date <= end)
                .unwrap_or(false)
        })
    }

    /// Sum of `total` over invoices paid (by `paid_date`, UTC) in the given
    /// calendar month. `month` is 1-based.
    pub fn revenue_by_month(&self, year: i32, month: u32) -> Result<f64> {
        let paid = self.filter(Collection::Invoices, |invoice| {
            if !field_equals(invoice, "status", "paid") {
                return false;
            }
            date_field(invoice, "paid_date")
                .map(|paid_date| paid_date.year() == year && paid_date.month() == month)
                .unwrap_or(false)
        })?;

        Ok(paid.iter().map(invoice_total).sum())
    }

    pub fn expenses_by_category(&self, category: &str) -> Result<Vec<Record>> {
        self.filter(Collection::Expenses, |expense| field_equals(expense, "category", category))
    }

    /// Events starting within the next `days` days.
    pub fn upcoming_events(&self, days: i64) -> Result<Vec<Record>> {
        self.upcoming_events_from(Utc::now(), days)
    }

    /// Events whose `start` lies in `[now, now + days]`. A window past the
    /// representable range is clamped to its end.
    pub fn upcoming_events_from(&self, now: DateTime<Utc>, days: i64) -> Result<Vec<Record>> {
        let until = window_end(now, days);
        self.filter(Collection::Events, |event| {
            date_field(event, "start")
                .map(|start| start >= now && start <= until)
                .unwrap_or(false)
        })
    }

    // ============================================
    // RELATIONSHIPS & JOINS
    // ============================================

    pub fn project_with_tasks(&self, project_id: &str) -> Result<Option<ProjectWithTasks>> {
        let Some(project) = self.get(Collection::Projects, project_id)? else {
            return Ok(None);
        };
        let tasks = self.project_tasks(project_id)?;
        Ok(Some(ProjectWithTasks { project, tasks }))
    }

    pub fn contact_with_history(&self, contact_id: &str) -> Result<Option<ContactHistory>> {
        let Some(contact) = self.get(Collection::Contacts, contact_id)? else {
            return Ok(None);
        };

        let references = |record: &Record, field: &str| field_equals(record, field, contact_id);
        Ok(Some(ContactHistory {
            contact,
            deals: self.filter(Collection::Deals, |deal| references(deal, "contact_id"))?,
            projects: self.filter(Collection::Projects, |p| references(p, "client_id"))?,
            invoices: self.filter(Collection::Invoices, |i| references(i, "client_id"))?,
            appointments: self.filter(Collection::Appointments, |a| references(a, "client_id"))?,
        }))
    }

    pub fn invoice_with_client(&self, invoice_id: &str) -> Result<Option<InvoiceWithClient>> {
        let Some(invoice) = self.get(Collection::Invoices, invoice_id)? else {
            return Ok(None);
        };

        let client = match invoice.str_field("client_id") {
            Some(client_id) => self.get(Collection::Contacts, client_id)?,
            None => None,
        };
        let project = match invoice.str_field("project_id").filter(|id| !id.is_empty()) {
            Some(project_id) => self.get(Collection::Projects, project_id)?,
            None => None,
        };

        Ok(Some(InvoiceWithClient { invoice, client, project }))
    }

    // ============================================
    // AGGREGATIONS
    // ============================================

    /// Headline numbers for the dashboard, recomputed from storage on every
    /// call.
    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let contacts = self.list(Collection::Contacts)?;
        let projects = self.list(Collection::Projects)?;
        let tasks = self.list(Collection::Tasks)?;
        let invoices = self.list(Collection::Invoices)?;

        Ok(DashboardStats {
            total_contacts: contacts.len(),
            active_projects: projects
                .iter()
                .filter(|p| field_equals(p, "status", "active"))
                .count(),
            pending_tasks: tasks.iter().filter(|t| !t.is_truthy("completed")).count(),
            unpaid_invoices: invoices
                .iter()
                .filter(|i| {
                    field_equals(i, "status", "sent") || field_equals(i, "status", "overdue")
                })
                .count(),
            total_revenue: invoices
                .iter()
                .filter(|i| field_equals(i, "status", "paid"))
                .map(invoice_total)
                .sum(),
        })
    }
}
