use crate::messages::TouchEvent;
use anyhow::{Context, Result};
use evdev::{Device, EventType, KeyCode};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Map one raw evdev record to a touch press/release.
///
/// Only the primary touch button is consumed; autorepeat (value 2) and every
/// other event type are ignored.
pub fn classify(event_type: EventType, code: u16, value: i32, at: Instant) -> Option<TouchEvent> {
    if event_type != EventType::KEY || code != KeyCode::BTN_TOUCH.code() {
        return None;
    }

    match value {
        1 => Some(TouchEvent::Press(at)),
        0 => Some(TouchEvent::Release(at)),
        _ => None,
    }
}

/// Read the touch device and forward press/release records on `tx`.
///
/// Returns an error when the device cannot be opened or stops producing events;
/// the caller keeps running without gestures in that case.
pub async fn monitor_touch(path: PathBuf, tx: mpsc::Sender<TouchEvent>) -> Result<()> {
    let device =
        Device::open(&path).with_context(|| format!("Failed to open touch device {:?}", path))?;

    tracing::info!(
        "Touch input: {} ({:?})",
        device.name().unwrap_or("unnamed device"),
        path
    );

    let mut stream = device
        .into_event_stream()
        .context("Failed to create touch event stream")?;

    loop {
        let event = stream
            .next_event()
            .await
            .context("Failed to read touch event")?;

        let Some(touch) = classify(event.event_type(), event.code(), event.value(), Instant::now())
        else {
            continue;
        };

        tracing::debug!("Touch: {:?}", touch);
        if tx.send(touch).await.is_err() {
            break;
        }
    }

    Ok(())
}
