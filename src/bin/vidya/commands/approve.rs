//! Approve command - moderate a submitted report

use anyhow::{anyhow, bail, Result};
use dialoguer::{theme::ColorfulTheme, Password};
use vidya_catalog::models::Status;
use vidya_catalog::{authorize, Access, AccessDecision, IdentityProvider, LocalIdentity};

use crate::style::*;
use crate::Context;

pub async fn run(ctx: &Context, id: &str, email: &str, reject: bool) -> Result<()> {
    let report = ctx
        .store
        .report_by_id(id)?
        .ok_or_else(|| anyhow!("Report {} not found", id))?;

    let password: String = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Admin password")
        .interact()?;

    let identity = LocalIdentity::new(ctx.store.clone());
    let admin = identity.admin_sign_in(email, &password).await?;
    if authorize(Some(&admin), Access::Admin) != AccessDecision::Allow {
        bail!("Admin access required");
    }

    let status = if reject {
        Status::Rejected
    } else {
        Status::Approved
    };
    if report.status == status {
        print_info(&format!("Report {} is already {}", id, status));
        identity.sign_out().await;
        return Ok(());
    }

    let updated = ctx.store.set_report_status(id, status)?;
    identity.sign_out().await;

    print_success(&format!(
        "{} \"{}\" ({} → {})",
        style_bold(&admin.username),
        updated.title,
        style_status(report.status),
        style_status(updated.status)
    ));
    Ok(())
}
