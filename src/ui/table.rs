use tabled::{settings::Style, Table, Tabled};
use crate::models::{Contact, Profile};
use crate::storage::DbStats;

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Company")]
    company: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Phone")]
    phone: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct ContactRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Details")]
    details: String,
    #[tabled(rename = "Value (EUR)")]
    value: String,
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Table")]
    table: &'static str,
    #[tabled(rename = "Rows")]
    rows: usize,
}

pub fn profiles_table(profiles: &[Profile]) -> String {
    if profiles.is_empty() {
        return String::new();
    }
    let rows = profiles.iter().map(|p| ProfileRow {
        id: p.id,
        name: p.display_name(),
        company: p.company.clone(),
        role: p.role.clone().unwrap_or_default(),
        email: p.email.clone().unwrap_or_default(),
        phone: p.phone.clone().unwrap_or_default(),
        status: crate::ui::status_badge(&p.status),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn contacts_table(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return String::new();
    }
    let rows = contacts.iter().map(|c| ContactRow {
        date: c.date.clone(),
        kind: c.kind.clone(),
        details: c.details.clone(),
        value: format!("{:.2}", c.value_eur),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn stats_table(stats: &DbStats) -> String {
    let rows = [
        MetricRow { table: "profiles", rows: stats.profiles },
        MetricRow { table: "contacts", rows: stats.contacts },
        MetricRow { table: "scheduled_contacts", rows: stats.scheduled_contacts },
        MetricRow { table: "products", rows: stats.products },
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}
