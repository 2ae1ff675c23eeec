//! Wall-clock tick scheduling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::controller::EngineState;
use crate::engine::{PlaybackEngine, TickOutcome};
use crate::media::{MasterClock, VisualSource};

/// What a scheduler run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub frames_rendered: u64,

    /// Outcome that ended the run, `None` when stopped by the flag.
    pub last: Option<TickOutcome>,
}

/// Tick `engine` at `tick_hz` until it stops on its own or `stop` is set.
///
/// Late ticks are skipped rather than bunched up. Stopping during an export
/// finalizes the sink with whatever was recorded.
pub async fn run_realtime<M, V, F>(
    engine: &mut PlaybackEngine<M, V>,
    tick_hz: u32,
    stop: Arc<AtomicBool>,
    mut on_tick: F,
) -> RunSummary
where
    M: MasterClock,
    V: VisualSource,
    F: FnMut(&PlaybackEngine<M, V>, &TickOutcome),
{
    let period = Duration::from_nanos(1_000_000_000 / u64::from(tick_hz.max(1)));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut summary = RunSummary {
        ticks: 0,
        frames_rendered: 0,
        last: None,
    };

    loop {
        ticker.tick().await;

        if stop.load(Ordering::Relaxed) {
            tracing::info!(ticks = summary.ticks, "Scheduler stop requested");
            if engine.state() == EngineState::Exporting {
                summary.last = Some(match engine.stop_export() {
                    Ok(artifact) => TickOutcome::ExportFinished(artifact),
                    Err(e) => TickOutcome::ExportFailed(e.to_string()),
                });
            } else if engine.state() == EngineState::Playing {
                if let Err(e) = engine.set_playing(false) {
                    tracing::warn!(error = %e, "Failed to pause on stop");
                }
            }
            return summary;
        }

        let outcome = engine.advance_tick();
        summary.ticks += 1;
        on_tick(engine, &outcome);

        match outcome {
            TickOutcome::Rendered { .. } => summary.frames_rendered += 1,
            other => {
                tracing::debug!(ticks = summary.ticks, outcome = ?other, "Scheduler finished");
                summary.last = Some(other);
                return summary;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::testing::{FakeMaster, FakeVisual};
    use lyricut_project_model::{ClipSequence, CueStore, StyleConfig};
    use lyricut_render_engine::{Compositor, FontBook, OutputSize};

    fn engine(master: FakeMaster) -> PlaybackEngine<FakeMaster, FakeVisual> {
        PlaybackEngine::new(
            master,
            FakeVisual::default(),
            Compositor::new(Box::new(FontBook::empty())),
            Arc::new(ClipSequence::new()),
            Arc::new(CueStore::new()),
            StyleConfig::default(),
            EngineSettings {
                output: OutputSize::new(8, 8),
                ..EngineSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_idle_engine_returns_immediately() {
        let mut engine = engine(FakeMaster::paused(0.0, 5.0));
        let summary = run_realtime(&mut engine, 60, Arc::new(AtomicBool::new(false)), |_, _| {})
            .await;
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.last, Some(TickOutcome::Idle));
    }

    #[tokio::test]
    async fn test_run_ends_with_master() {
        let mut engine = engine(FakeMaster::paused(5.0, 5.0));
        engine.set_playing(true).unwrap();

        let mut seen = Vec::new();
        let summary = run_realtime(&mut engine, 200, Arc::new(AtomicBool::new(false)), |_, o| {
            seen.push(o.clone())
        })
        .await;
        assert_eq!(summary.last, Some(TickOutcome::Ended));
        assert_eq!(seen, vec![TickOutcome::Ended]);
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[tokio::test]
    async fn test_stop_flag_pauses_playback() {
        let mut engine = engine(FakeMaster::playing(0.0, 5.0));
        engine.set_playing(true).unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let summary = run_realtime(&mut engine, 200, stop, move |_, _| {
            flag.store(true, Ordering::Relaxed);
        })
        .await;
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.frames_rendered, 1);
        assert_eq!(summary.last, None);
        assert_eq!(engine.state(), EngineState::Idle);
    }
}
