use super::TaskEngine;
use super::test_helpers::{
    FixedStatusPolicy, SequentialAudienceSource, StoreDownPolicy, create_test_engine,
    create_test_engine_with, seed_group, test_config,
};
use crate::error::Error;
use crate::types::{AccountStatus, Event, SkipReason, TaskKind, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

mod control;
mod lifecycle;
mod settings;

/// Drain every event already buffered for this subscriber
fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
