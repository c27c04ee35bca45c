//! Blog commands - discovery listing and article detail

use std::sync::Arc;

use anyhow::{anyhow, Result};
use vidya_catalog::models::Article;
use vidya_catalog::{DiscoverySession, Origin, QueryWindow};

use crate::style::*;
use crate::Context;

fn print_article_line(article: &Article) {
    println!(
        "{:>5}  {}  {}",
        style_yellow(&format!("♥{}", article.likes)),
        style_bold(&article.title),
        style_dim(&format!("#{}", article.id))
    );
    println!(
        "       {} · {} · {}",
        article.author,
        article.published_at.format("%Y-%m-%d"),
        style_dim(&article.tags.join(", "))
    );
}

pub async fn run(ctx: &Context, query: &str, page: u32) -> Result<()> {
    let session = DiscoverySession::new(
        Arc::new(super::pipeline(ctx)),
        ctx.config.discovery.page_size,
        ctx.config.discovery.debounce(),
        QueryWindow::settled(query, page),
    );
    session.start().await?;
    let view = session.view();

    print_header(&format!("Security Blogs - page {}", view.page));

    match &view.origin {
        Some(Origin::TagSweep(tag)) => {
            print_info(&format!("Nothing on this page, showing #{} instead", tag))
        }
        Some(Origin::Featured) | Some(Origin::StaticFallback) => {
            print_warning("Article source unreachable, showing a saved article")
        }
        _ => {}
    }

    if view.articles.is_empty() {
        print_info("No articles found.");
        return Ok(());
    }

    println!();
    for article in &view.articles {
        print_article_line(article);
    }
    println!();
    println!("{}", style_dim(&format!("?{}", session.to_location_query())));

    Ok(())
}

pub async fn article(ctx: &Context, id: &str) -> Result<()> {
    let article = super::pipeline(ctx)
        .article(id)
        .await
        .ok_or_else(|| anyhow!("Article {} not found", id))?;

    print_header(&article.title);
    print_article_line(&article);
    println!();
    if !article.excerpt.is_empty() {
        println!("{}", article.excerpt);
        println!();
    }
    if let Some(body) = &article.body_html {
        println!("{}", body);
    }
    Ok(())
}
