/*
 * Copyright (c) 2024. Courier Contributors
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

#![allow(dead_code, unused_doc_comments)]

use std::time::Duration;

use courier::prelude::*;

use crate::setup::{
    actors::{Counter, Postmark, Volatile},
    initialize_tracing,
    messages::{Explode, Ping, Sting},
};

mod setup;

const PATIENCE: Duration = Duration::from_secs(5);

/// Tests that a panicking recipient is contained.
///
/// **Scenario:**
/// 1. Inject a payload the recipient panics on.
/// 2. Inject an ordinary payload to the same recipient afterwards.
///
/// **Verification:**
/// - The panicked delivery still completes its message's request.
/// - The pool survives: the follow-up delivery succeeds and the worker
///   floor is intact.
#[tokio::test]
async fn test_panicking_recipient_does_not_poison_the_pool() -> anyhow::Result<()> {
    initialize_tracing();
    let engine = DispatchEngine::launch(
        EngineConfig::default()
            .with_low_water_mark(1)
            .with_high_water_mark(2),
    );
    let sender = Postmark::new("sender");
    let volatile = Volatile::new("volatile");

    let explosive = Message::compose(Explode)
        .from(sender.sender_ref())
        .to(volatile.handle())
        .build();
    engine.inject(explosive)?.request().standby(PATIENCE).await?;

    let follow_up = Message::compose(Ping)
        .from(sender.sender_ref())
        .to(volatile.handle())
        .build();
    engine.inject(follow_up)?.request().standby(PATIENCE).await?;

    assert_eq!(volatile.handled(), 1);
    assert!(engine.live_workers() >= engine.low_water_mark());
    engine.shutdown().await;
    Ok(())
}

/// Tests that a recipient returning an error neither blocks the message's
/// completion nor the deliveries that follow it.
#[tokio::test]
async fn test_failed_delivery_still_completes_message() -> anyhow::Result<()> {
    initialize_tracing();
    let engine = DispatchEngine::launch(EngineConfig::default());
    let sender = Postmark::new("sender");
    let volatile = Volatile::new("volatile");

    let stinger = Message::compose(Sting)
        .from(sender.sender_ref())
        .to(volatile.handle())
        .build();
    engine.inject(stinger)?.request().standby(PATIENCE).await?;

    let follow_up = Message::compose(Ping)
        .from(sender.sender_ref())
        .to(volatile.handle())
        .build();
    engine.inject(follow_up)?.request().standby(PATIENCE).await?;

    assert_eq!(volatile.handled(), 1);
    engine.shutdown().await;
    Ok(())
}

/// Tests that one panicking recipient in a fan-out does not hold up the
/// message's completion for its healthy co-recipients.
#[tokio::test]
async fn test_fanout_completes_despite_one_panicking_recipient() -> anyhow::Result<()> {
    initialize_tracing();
    let engine = DispatchEngine::launch(EngineConfig::default());
    let sender = Postmark::new("sender");
    let volatile = Volatile::new("volatile");
    let counter = Counter::new("steady");

    let message = Message::compose(Explode)
        .from(sender.sender_ref())
        .to(volatile.handle())
        .to(counter.handle())
        .build();
    engine.inject(message)?.request().standby(PATIENCE).await?;

    // The healthy recipient still got its delivery.
    assert_eq!(counter.hits(), 1);
    engine.shutdown().await;
    Ok(())
}
