//! Continuation-style pipe with simulated latency.
//!
//! Run with `RUST_LOG=debug cargo run --example continuation` to see the
//! engine's own log lines.

use anyhow::{Context, Result};
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
fn do_something_uninteresting(_args: &[Value], done: Completion) -> Result<()> {
    let wait = random_wait(1000);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(wait)).await;
        done.complete(Ok(json!(format!(
            "It took me {wait} milliseconds to notice you."
        ))));
    });
    Ok(())
}

fn log_it(it: Value, next: Next) -> Result<()> {
    info!(value = ?it, "log_it");
    next.advance(Ok(it));
    Ok(())
}

fn observe_it(it: Value, next: Next) -> Result<()> {
    println!("observed: {}", it.as_str().unwrap_or_default());
    next.advance(Ok(it));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let mut pipe = Pipe::with_source(do_something_uninteresting).with_name("uninteresting");
    pipe.use_middleware(log_it).use_middleware(observe_it);
    pipe.on_callback_failure(|failure| {
        eprintln!("callback failed in {}: {}", failure.pipe, failure.message);
    });

    match pipe.run(vec![]).await {
        Ok(message) => println!("Got a message: {}", message.as_str().unwrap_or_default()),
        Err(e) => println!("Got an error: {e:?}"),
    }

    let greeter = pipe.fork(|args: &[Value], done: Completion| {
        let you = args
            .first()
            .and_then(Value::as_str)
            .context("expected a name")?
            .to_string();
        done.complete(Ok(json!(format!("Somebody poked me, {you}!"))));
        Ok(())
    });

    let message = greeter.run(vec![json!("tester")]).await?;
    println!("Got a message: {}", message.as_str().unwrap_or_default());
    Ok(())
}
