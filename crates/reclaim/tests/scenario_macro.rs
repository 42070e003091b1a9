//! `#[reclaim::scenario]` expansion.
#![cfg(feature = "macros")]

use std::sync::Arc;

use reclaim::Settle;

#[reclaim::scenario(tick_ms = 10, timeout_ms = 2_000)]
async fn dropped_value_is_reported(settle: Settle) -> reclaim::Result<()> {
    let expected = settle.expect(["value"])?;
    let registry = settle.registry(expected, |_key| Ok(()));

    let value = Arc::new(String::from("short lived"));
    registry.register(&value, "value");
    Ok(())
}

#[reclaim::scenario(name = "unit body", tick_ms = 10, timeout_ms = 2_000)]
async fn unit_body_waits_for_settlement(settle: Settle) {
    let expected = settle.expect(["value"]).unwrap();
    let registry = settle.registry(expected, |_key| Ok(()));
    registry.register(&Arc::new(7_u32), "value");
}

#[reclaim::scenario(flavor = "multi_thread", tick_ms = 10, timeout_ms = 2_000)]
async fn multi_thread_flavor(settle: Settle) -> reclaim::Result<()> {
    let expected = settle.expect(["a", "b"])?;
    let registry = settle.registry(expected, |_key| Ok(()));

    let a = Arc::new(1_u8);
    let b = Arc::new(2_u8);
    registry.register(&a, "a");
    registry.register(&b, "b");
    tokio::spawn(async move { drop((a, b)) })
        .await
        .map_err(reclaim::Error::rejected)?;
    Ok(())
}

#[reclaim::scenario(tick_ms = 10, window_ms = 100, timeout_ms = 200)]
#[should_panic(expected = "timed out")]
async fn leaked_value_fails(settle: Settle) -> reclaim::Result<()> {
    let expected = settle.expect(["leaked"])?;
    let registry = settle.registry(expected, |_key| Ok(()));

    let value = Arc::new(0_u64);
    registry.register(&value, "leaked");
    std::mem::forget(value);
    Ok(())
}

#[reclaim::scenario(tick_ms = 10, timeout_ms = 2_000)]
#[should_panic(expected = "failed: scenario body panicked")]
async fn body_panic_fails(_settle: Settle) -> reclaim::Result<()> {
    assert_eq!(1 + 1, 3, "arithmetic");
    Ok(())
}
