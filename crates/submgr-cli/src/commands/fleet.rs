//! Whole-fleet operations: load, empty, reconcile.

use submgr_fleet::SuccessPolicy;

use super::{Context, finish};

pub async fn load(ctx: &Context, policy: &SuccessPolicy) -> anyhow::Result<()> {
    let snapshot = ctx.store.snapshot(&ctx.config.nodes)?;
    let report = ctx.fleet().load(&snapshot).await;
    finish(&report, policy)
}

pub async fn empty(ctx: &Context, policy: &SuccessPolicy) -> anyhow::Result<()> {
    let snapshot = ctx.store.snapshot(&ctx.config.nodes)?;
    let report = ctx.fleet().empty(&snapshot).await;
    finish(&report, policy)
}

pub async fn reconcile(ctx: &Context, policy: &SuccessPolicy) -> anyhow::Result<()> {
    let snapshot = ctx.store.snapshot(&ctx.config.nodes)?;
    let report = ctx.fleet().reconcile(&snapshot).await;
    finish(&report, policy)
}
