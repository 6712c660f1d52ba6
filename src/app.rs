//! Orchestrator state and event handlers.
//!
//! `App` holds the collaborators and translates events from the main loop
//! into the copy cycle: a trigger spawns a cycle task (enumerate, join,
//! ensure context, deliver), the writer's outcome arrives later as its own
//! event, and success feedback reverts on a timer. Outcomes carry no request
//! identifier; feedback is attributed to the most recent trigger.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::events::Event;
use crate::indicator::{IconState, Indicator};
use crate::tabs::{join_urls, TabSource};
use crate::writer::{CopyRequest, WriterManager};

/// The orchestrator component.
pub struct App {
    tabs: Arc<dyn TabSource>,
    writer: Arc<WriterManager>,
    indicator: Arc<dyn Indicator>,
    event_tx: mpsc::Sender<Event>,
    feedback_delay: Duration,
}

impl App {
    /// Creates the orchestrator over its collaborators.
    pub fn new(
        tabs: Arc<dyn TabSource>,
        writer: Arc<WriterManager>,
        indicator: Arc<dyn Indicator>,
        event_tx: mpsc::Sender<Event>,
        feedback_delay: Duration,
    ) -> Self {
        Self {
            tabs,
            writer,
            indicator,
            event_tx,
            feedback_delay,
        }
    }

    /// Starts a copy cycle. Cycles run as their own tasks so rapid triggers
    /// queue behind one another instead of blocking the event loop. Any
    /// failure inside the cycle is logged and the cycle ends with the
    /// indicator untouched.
    pub fn on_triggered(&self) {
        let tabs = Arc::clone(&self.tabs);
        let writer = Arc::clone(&self.writer);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = run_cycle(tabs.as_ref(), &writer).await {
                let _ = event_tx
                    .send(Event::CycleAborted {
                        error: format!("{err:#}"),
                    })
                    .await;
            }
        });
    }

    /// Enumeration or delivery failed; the cycle is over and the indicator
    /// stays in its resting state.
    pub fn on_cycle_aborted(&self, error: &str) {
        tracing::error!("copy cycle failed: {error}");
    }

    /// Success feedback: swap the indicator and schedule the revert.
    pub fn on_copy_succeeded(&self) {
        if let Err(err) = self.indicator.set_state(IconState::Success) {
            tracing::error!("failed to update indicator: {err:#}");
        }
        let event_tx = self.event_tx.clone();
        let delay = self.feedback_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = event_tx.send(Event::IndicatorRevert).await;
        });
    }

    /// A failed write never changes the indicator; the report is log-only.
    pub fn on_copy_failed(&self, error: &str) {
        tracing::warn!("clipboard write failed: {error}");
    }

    /// Restores the resting indicator after the feedback window.
    pub fn on_indicator_revert(&self) {
        if let Err(err) = self.indicator.set_state(IconState::Default) {
            tracing::error!("failed to update indicator: {err:#}");
        }
    }
}

async fn run_cycle(tabs: &dyn TabSource, writer: &WriterManager) -> Result<()> {
    let tabs = tabs
        .current_window()
        .await
        .context("failed to enumerate tabs")?;
    let request = CopyRequest {
        text: join_urls(&tabs),
    };
    writer
        .deliver(request)
        .await
        .context("failed to deliver to writer context")?;
    Ok(())
}
