//! Input pumps and the report dispatcher.
//!
//! Every input device gets its own pump task that forwards decoded events
//! into one shared channel.  A single dispatcher task owns the
//! [`InputState`]: it applies events strictly in arrival order and publishes
//! each resulting report on the [`ReportBus`].  Because nothing else touches
//! the state, every report is a consistent snapshot.

use btk_core::{InputEvent, InputState, PointerReport, Report};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::report_bus::ReportBus;
use crate::infrastructure::input_capture::InputSource;

/// Message from a pump to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMessage {
    Input(InputEvent),
    /// The named source stopped producing events.
    SourceLost(String),
}

/// Forwards every event of `source` to `events` until either side ends.
pub async fn pump_source(mut source: Box<dyn InputSource>, events: mpsc::Sender<SourceMessage>) {
    let name = source.name().to_string();
    loop {
        match source.next_event().await {
            Ok(Some(event)) => {
                if events.send(SourceMessage::Input(event)).await.is_err() {
                    debug!("{name}: dispatcher gone; stopping pump");
                    return;
                }
            }
            Ok(None) => {
                info!("{name}: input source ended");
                break;
            }
            Err(e) => {
                warn!("{e}; input source stopped");
                break;
            }
        }
    }
    let _ = events.send(SourceMessage::SourceLost(name)).await;
}

/// Applies events to a fresh [`InputState`] and publishes every report.
///
/// When a source is lost while keys or buttons are held, the state is reset
/// and idle reports are published so no host is left with a stuck key.
/// Returns the final state once every pump has ended.
pub async fn run_dispatcher(mut events: mpsc::Receiver<SourceMessage>, bus: ReportBus) -> InputState {
    let mut state = InputState::new();
    while let Some(message) = events.recv().await {
        match message {
            SourceMessage::Input(event) => {
                if let Some(report) = state.apply(event) {
                    bus.publish(report);
                }
            }
            SourceMessage::SourceLost(name) => {
                if state.is_idle() {
                    continue;
                }
                info!("{name} lost with input held; releasing everything");
                state.reset();
                bus.publish(Report::Keyboard(state.keyboard_report()));
                bus.publish(Report::Pointer(PointerReport::new(state.buttons(), 0, 0, 0)));
            }
        }
    }
    debug!("all input sources ended; dispatcher stopping");
    state
}
