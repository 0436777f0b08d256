//! Entry-gate scan cycle: an explicit four-state machine driving a QR decoder
//! through scanning → validating → result display → reset. The decoder is
//! detached before the validation request starts and reattached only after the
//! dwell timer fires, so exactly one cycle is ever in flight and no two timers
//! can overlap.

pub mod audio;

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::error::ClientError;
use crate::gate::audio::{Tone, ToneSink};
use crate::models::{EntryDecision, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Scanning,
    Validating,
    ResultDisplay,
    Resetting,
}

/// Decoder seam. Frame-level decode noise while no code is in view is the
/// source's problem; `next_decode` only ever yields decoded text.
#[async_trait]
pub trait ScanSource: Send + Sync {
    /// Attach the decoder. An initialization failure here (camera missing,
    /// device busy) aborts before the cycle ever starts.
    async fn start(&mut self) -> Result<(), ClientError>;

    /// Next decoded payload; `None` means the source is gone for good.
    async fn next_decode(&mut self) -> Option<String>;

    /// Detach the decoder. Anything presented while detached is dropped.
    async fn stop(&mut self);
}

/// Backend verdict seam, implemented by [`crate::api::ApiClient`].
#[async_trait]
pub trait ScanValidator: Send + Sync {
    async fn validate(&self, payload: &serde_json::Value) -> Result<ScanResult, ClientError>;
}

/// What the kiosk panel renders for one result window.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    /// Visual treatment is chosen solely by the entry decision.
    pub allowed: bool,
    pub name: Option<String>,
    pub membership_label: Option<String>,
    pub reason: String,
}

impl ResultView {
    pub fn from_result(result: &ScanResult) -> Self {
        ResultView {
            allowed: result.entry == EntryDecision::Allowed,
            name: result.user.as_ref().map(|u| u.name.clone()),
            membership_label: result.user.as_ref().map(|u| u.membership_label()),
            reason: result.reason.clone(),
        }
    }
}

/// Kiosk display seam.
pub trait ResultSink: Send + Sync {
    fn show(&self, view: &ResultView);
    fn clear(&self);
}

/// Renders result panels into the log; stands in for a real kiosk display.
pub struct LogResultSink;

impl ResultSink for LogResultSink {
    fn show(&self, view: &ResultView) {
        if view.allowed {
            tracing::info!(
                name = view.name.as_deref().unwrap_or("-"),
                membership = view.membership_label.as_deref().unwrap_or("-"),
                "ENTRY ALLOWED: {}",
                view.reason
            );
        } else {
            tracing::info!("ENTRY DENIED: {}", view.reason);
        }
    }

    fn clear(&self) {
        tracing::debug!("result panel cleared");
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CycleTimings {
    /// Dwell after a backend-supplied verdict.
    pub result_dwell: Duration,
    /// Dwell after a locally synthesized denial. Shorter on purpose: operator
    /// error recovers faster than a real verdict reveal. Do not unify.
    pub decode_failure_dwell: Duration,
}

impl CycleTimings {
    pub fn from_config(config: &Config) -> Self {
        CycleTimings {
            result_dwell: Duration::from_millis(config.result_dwell_ms),
            decode_failure_dwell: Duration::from_millis(config.decode_failure_dwell_ms),
        }
    }
}

impl Default for CycleTimings {
    fn default() -> Self {
        CycleTimings {
            result_dwell: Duration::from_millis(4000),
            decode_failure_dwell: Duration::from_millis(3000),
        }
    }
}

pub struct GateCycle {
    source: Box<dyn ScanSource>,
    validator: std::sync::Arc<dyn ScanValidator>,
    tones: std::sync::Arc<dyn ToneSink>,
    display: std::sync::Arc<dyn ResultSink>,
    timings: CycleTimings,
    state_tx: watch::Sender<GateState>,
}

impl GateCycle {
    pub fn new(
        source: Box<dyn ScanSource>,
        validator: std::sync::Arc<dyn ScanValidator>,
        tones: std::sync::Arc<dyn ToneSink>,
        display: std::sync::Arc<dyn ResultSink>,
        timings: CycleTimings,
    ) -> Self {
        let (state_tx, _) = watch::channel(GateState::Scanning);
        GateCycle {
            source,
            validator,
            tones,
            display,
            timings,
            state_tx,
        }
    }

    pub fn state_watch(&self) -> watch::Receiver<GateState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: GateState) {
        let _ = self.state_tx.send(state);
    }

    /// Runs the cycle until the source closes. A source that cannot start at
    /// all returns the error for a persistent operator panel instead of
    /// entering the cycle.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        self.source.start().await?;
        self.set_state(GateState::Scanning);

        while let Some(text) = self.source.next_decode().await {
            self.set_state(GateState::Validating);
            // Detached before the request; nothing can start a second cycle.
            self.source.stop().await;

            let (result, dwell) = self.resolve(&text).await;

            self.set_state(GateState::ResultDisplay);
            let view = ResultView::from_result(&result);
            self.display.show(&view);
            self.play_cue(result.entry);

            // The dwell IS the display window: single-shot, no manual dismiss.
            tokio::time::sleep(dwell).await;
            self.set_state(GateState::Resetting);
            self.display.clear();
            self.source.start().await?;
            self.set_state(GateState::Scanning);
        }

        Ok(())
    }

    /// A payload that is not JSON never reaches the network; a request that
    /// fails collapses to the same local denial. Both locally synthesized
    /// paths use the shorter dwell; only a backend verdict earns the full one.
    async fn resolve(&self, text: &str) -> (ScanResult, Duration) {
        let payload: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => return (ScanResult::invalid_format(), self.timings.decode_failure_dwell),
        };

        match self.validator.validate(&payload).await {
            Ok(result) => (result, self.timings.result_dwell),
            Err(e) => {
                tracing::warn!(error = %e, "scan validation failed");
                (ScanResult::invalid_format(), self.timings.decode_failure_dwell)
            }
        }
    }

    fn play_cue(&self, decision: EntryDecision) {
        let tone = Tone::for_decision(decision);
        if let Err(e) = self.tones.play(tone) {
            tracing::debug!(error = %e, "tone playback failed");
        }
    }
}

/// Line-oriented scan source for USB/serial QR scanners that present as
/// keyboard input: one decoded payload per line on stdin.
pub struct StdinScanSource {
    rx: mpsc::UnboundedReceiver<String>,
}

impl StdinScanSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                // Blank reads are decode noise, not a scan.
                if line.is_empty() {
                    continue;
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        StdinScanSource { rx }
    }
}

impl Default for StdinScanSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanSource for StdinScanSource {
    async fn start(&mut self) -> Result<(), ClientError> {
        // Fresh attach: anything scanned while detached is stale and dropped.
        while self.rx.try_recv().is_ok() {}
        Ok(())
    }

    async fn next_decode(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    async fn stop(&mut self) {}
}
