//! Seed command - starter catalog and admin account

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Password};
use vidya_catalog::models::Role;
use vidya_catalog::seed;
use vidya_catalog::LocalIdentity;

use crate::style::*;
use crate::Context;

pub fn run(ctx: &Context, username: &str, email: &str) -> Result<()> {
    print_header("Seeding catalog");

    let admin_id = match ctx.store.user_by_email(email)? {
        Some(existing) => {
            print_info(&format!("Using existing account {}", existing.username));
            existing.id
        }
        None => {
            let password: String = Password::with_theme(&ColorfulTheme::default())
                .with_prompt("New admin password")
                .with_confirmation("Confirm password", "Passwords do not match")
                .interact()?;
            let identity = LocalIdentity::new(ctx.store.clone());
            let admin = identity.register(username, email, &password, Role::Admin)?;
            print_success(&format!("Created admin {}", style_cyan(&admin.username)));
            admin.id
        }
    };

    let reports = seed::sample_reports();
    for report in &reports {
        ctx.store.insert_report(report)?;
    }
    print_success(&format!("{} reports", reports.len()));

    let blogs = seed::sample_blogs(&admin_id);
    for blog in &blogs {
        ctx.store.insert_blog(blog)?;
    }
    print_success(&format!("{} blogs", blogs.len()));

    let ctfs = seed::sample_ctfs(&admin_id);
    for ctf in &ctfs {
        ctx.store.insert_ctf(ctf)?;
    }
    print_success(&format!("{} CTFs", ctfs.len()));

    println!();
    println!("Database: {}", style_dim(&ctx.config.database.path));
    Ok(())
}
