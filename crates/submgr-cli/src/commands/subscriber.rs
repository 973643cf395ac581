//! Subscriber lifecycle: add, rm, list, sub.

use anyhow::{Context as _, bail};
use tracing::{info, warn};

use submgr_core::{LevelPolicy, Subscriber, Uuid, epoch_secs};
use submgr_fleet::SuccessPolicy;
use submgr_link::assemble;

use super::{Context, finish};

pub async fn add(
    ctx: &Context,
    policy: &SuccessPolicy,
    name: &str,
    level: u32,
    id: Option<String>,
    expires_at: Option<u64>,
) -> anyhow::Result<()> {
    let id = match id {
        Some(id) => parse_id(&id)?,
        None => Uuid::new_v4().to_string(),
    };
    if ctx.store.get_subscriber(&id)?.is_some() {
        bail!("subscriber {id} already exists");
    }

    let mut subscriber = Subscriber::new(&id, name, level);
    subscriber.expires_at = expires_at;
    ctx.store.put_subscriber(&subscriber)?;
    info!(%id, %name, level, "subscriber created");
    println!("{id}");

    let snapshot = ctx.store.snapshot(&ctx.config.nodes)?;
    let report = ctx.fleet().add_subscriber(&snapshot, &id).await?;
    finish(&report, policy)
}

pub async fn remove(ctx: &Context, policy: &SuccessPolicy, id: &str) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    if !ctx.store.delete_subscriber(&id)? {
        warn!(%id, "subscriber not in store, revoking from nodes anyway");
    }
    let snapshot = ctx.store.snapshot(&ctx.config.nodes)?;
    let report = ctx.fleet().remove_subscriber(&snapshot, &id).await?;
    finish(&report, policy)
}

pub fn list(ctx: &Context, format: &str) -> anyhow::Result<()> {
    let subscribers = ctx.store.list_subscribers()?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&subscribers)?),
        "text" => {
            let now = epoch_secs();
            for s in &subscribers {
                let expiry = match s.expires_at {
                    Some(_) if s.is_expired(now) => "expired".to_string(),
                    Some(at) => format!("until {at}"),
                    None => "-".to_string(),
                };
                println!("{}  {:<16} level {:<4} {}", s.id, s.name, s.level, expiry);
            }
            println!("{} subscriber(s)", subscribers.len());
        }
        other => bail!("unknown format {other:?}, expected text or json"),
    }
    Ok(())
}

pub fn feed(ctx: &Context, id: &str, plain: bool) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    let Some(subscriber) = ctx.store.get_subscriber(&id)? else {
        bail!("subscriber {id} not found");
    };
    let subscription = assemble(&subscriber, &ctx.config.nodes, &LevelPolicy, epoch_secs());
    for failure in &subscription.errors {
        eprintln!("skipped {}/{}: {}", failure.node, failure.tag, failure.error);
    }
    if plain {
        println!("{}", subscription.text());
    } else {
        println!("{}", subscription.to_base64());
    }
    Ok(())
}

/// Subscriber ids are stored in lowercase hyphenated form.
fn parse_id(raw: &str) -> anyhow::Result<String> {
    let id = Uuid::parse_str(raw).with_context(|| format!("subscriber id must be a UUID, got {raw:?}"))?;
    Ok(id.hyphenated().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_normalized() {
        let id = "6f1c2a3e-9b4d-4e5f-8a7b-1c2d3e4f5a6b";
        assert_eq!(parse_id(id).unwrap(), id);
        assert_eq!(parse_id(&id.to_uppercase()).unwrap(), id);
        assert_eq!(parse_id("6f1c2a3e9b4d4e5f8a7b1c2d3e4f5a6b").unwrap(), id);
        assert_eq!(parse_id(&format!("{{{id}}}")).unwrap(), id);
    }

    #[test]
    fn malformed_ids_are_refused() {
        for raw in ["", "alice", "6f1c2a3e-9b4d-4e5f-8a7b-1c2d3e4f5a6", "6f1c2a3e-9b4d-4e5f-8a7b-1c2d3e4f5a6g"] {
            let err = parse_id(raw).unwrap_err();
            assert!(err.to_string().contains("must be a UUID"), "{raw}: {err}");
        }
    }
}
