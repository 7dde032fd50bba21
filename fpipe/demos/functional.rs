//! Functional pipeline mixing asynchronous and synchronous steps.
//!
//! Run with `RUST_LOG=debug cargo run --example functional` to see the
//! engine's own log lines.

use anyhow::Result;
use fpipe::prelude::*;
use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn random_wait(max: u64) -> u64 {
    rand::thread_rng().gen_range(0..=max)
}

/// Waits a random period, then reports how long it took.
fn do_something_uninteresting() -> PipeArg {
    PipeArg::deferred(|args| async move {
        let wait = random_wait(1000);
        tokio::time::sleep(Duration::from_millis(wait)).await;
        let data = args.first().cloned().unwrap_or(Value::Null);
        Ok(json!(format!(
            "It took me {wait} milliseconds to notice you gave me {data}."
        )))
    })
}

fn log_it() -> PipeArg {
    PipeArg::step(|mut args| {
        let it = args.pop().unwrap_or(Value::Null);
        info!(value = ?it, "log_it");
        Ok(it)
    })
}

fn observe_it() -> PipeArg {
    PipeArg::step(|mut args| {
        let it = args.pop().unwrap_or(Value::Null);
        info!("observed: {}", it.as_str().unwrap_or_default());
        Ok(it)
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let pipe = FPipe::new(vec![do_something_uninteresting()])?
        .with_name("uninteresting")
        .pipe(vec![log_it()])?
        .pipe(vec![observe_it()])?;

    match pipe.process(vec![json!("funcklewinker")]).await {
        Ok(message) => info!("Got a message: {}", message.as_str().unwrap_or_default()),
        Err(e) => info!("Got an error: {e:?}"),
    }

    let split = FPipe::new(vec![
        PipeArg::step(|args| {
            let x = args.first().and_then(Value::as_i64).unwrap_or_default();
            let y = args.get(1).and_then(Value::as_i64).unwrap_or_default();
            Ok(json!([x * 2, y * 5]))
        }),
        true.into(),
        PipeArg::step(|args| Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))),
    ])?;
    info!("5 * 2 + 2 * 5 = {}", split.process(vec![json!(5), json!(2)]).await?);
    Ok(())
}
