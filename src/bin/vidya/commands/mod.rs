//! CLI commands

pub mod approve;
pub mod blogs;
pub mod reports;
pub mod seed;

use std::sync::Arc;

use vidya_catalog::{DevtoClient, DiscoveryPipeline, DiscoverySettings};

use crate::Context;

/// Remote discovery with the local store as the detail fallback
pub fn pipeline(ctx: &Context) -> DiscoveryPipeline {
    let source = Arc::new(DevtoClient::from_config(&ctx.config.article_source));
    DiscoveryPipeline::new(source, DiscoverySettings::from_config(&ctx.config))
        .with_local(ctx.store.clone())
}
