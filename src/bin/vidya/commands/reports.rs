//! Reports command - filtered catalog listing

use anyhow::{Context as _, Result};
use vidya_catalog::filter;
use vidya_catalog::{Facets, QueryState};

use crate::style::*;
use crate::Context;

pub struct Filters {
    pub search: String,
    pub category: String,
    pub year: String,
    pub organization: String,
    pub severity: String,
    pub sort: String,
}

impl Filters {
    fn into_query(self) -> Result<QueryState> {
        Ok(QueryState {
            category: self
                .category
                .parse()
                .with_context(|| format!("Unknown category: {}", self.category))?,
            year: self
                .year
                .parse()
                .with_context(|| format!("Invalid year: {}", self.year))?,
            organization: self.organization.parse().unwrap_or_default(),
            severity: self
                .severity
                .parse()
                .with_context(|| format!("Unknown severity: {}", self.severity))?,
            sort: self.sort.into(),
            search: self.search,
        })
    }
}

pub fn run(ctx: &Context, filters: Filters) -> Result<()> {
    let query = filters.into_query()?;
    let approved = ctx.store.list_approved()?;
    let reports = filter::apply(&approved, &query);

    print_header("Vulnerability Reports");

    if reports.is_empty() {
        print_info("No reports match the current filters.");
        return Ok(());
    }

    println!();
    println!(
        "{:<8}  {:<8}  {:>4}  {:<24}  Title",
        "ID", "Severity", "Year", "Organization"
    );
    println!("{}", "─".repeat(80));

    for report in &reports {
        println!(
            "{:<8}  {}  {:>4}  {:<24}  {}",
            style_dim(&report.id),
            style_severity(report.severity),
            report.year,
            report.organization,
            report.title
        );
        if let Some(cve) = &report.cve_id {
            println!("{:<8}  {}", "", style_dim(cve));
        }
    }

    println!();
    let active = query.active_filter_count();
    if active > 0 {
        println!(
            "{} of {} reports ({} filters active, sorted by {})",
            reports.len(),
            approved.len(),
            active,
            query.sort
        );
    } else {
        println!("{} reports (sorted by {})", reports.len(), query.sort);
    }

    Ok(())
}

pub fn facets(ctx: &Context) -> Result<()> {
    let facets = Facets::collect(&ctx.store.list_approved()?);

    print_header("Filter Choices");
    let categories: Vec<String> = facets.categories.iter().map(|c| c.to_string()).collect();
    let years: Vec<String> = facets.years.iter().map(|y| y.to_string()).collect();

    println!("Categories:     {}", categories.join(", "));
    println!("Years:          {}", years.join(", "));
    println!("Organizations:  {}", facets.organizations.join(", "));
    Ok(())
}
