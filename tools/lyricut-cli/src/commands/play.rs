//! Real-time dry run: tick the engine against the wall clock and report
//! clip switches, cues, and drift corrections as they happen.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lyricut_common::clock::PlaybackClock;
use lyricut_common::config::AppConfig;
use lyricut_project_model::{ClipId, CueId};
use lyricut_sync_engine::{run_realtime, TickOutcome};

use super::{build_engine, load_project, print_warnings, timeline_secs};

pub async fn run(config: &AppConfig, path: PathBuf, from: f64) -> anyhow::Result<()> {
    let project = load_project(&path)?;
    let duration_secs = timeline_secs(&project)
        .ok_or_else(|| anyhow::anyhow!("Nothing to play: no audio track and no clips"))?;
    let tick_hz = config.playback.tick_hz.max(1);

    let mut engine = build_engine(config, &project, PlaybackClock::new(Some(duration_secs)), tick_hz);
    engine.seek(from)?;
    engine.set_playing(true)?;
    print_warnings(&mut engine);

    println!(
        "Playing {} from {from:.2}s of {duration_secs:.2}s at {tick_hz} Hz",
        project.project.name
    );
    println!("Press Ctrl+C to stop...");
    println!();

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::Relaxed);
        }
    });

    let mut last_clip: Option<ClipId> = None;
    let mut last_cue: Option<CueId> = None;
    let summary = run_realtime(&mut engine, tick_hz, stop, |engine, outcome| {
        let TickOutcome::Rendered {
            time_secs,
            clip,
            cue,
        } = outcome
        else {
            return;
        };
        if *clip != last_clip {
            match clip {
                Some(id) => println!("[{time_secs:>7.2}] clip {id}"),
                None => println!("[{time_secs:>7.2}] placeholder"),
            }
            last_clip = *clip;
        }
        if *cue != last_cue {
            if let Some(c) = cue.and_then(|id| engine.cues().get(id).cloned()) {
                println!("[{time_secs:>7.2}]   {} / {}", c.primary, c.secondary);
            }
            last_cue = *cue;
        }
    })
    .await;

    print_warnings(&mut engine);
    println!();
    println!("Stopped after {} tick(s)", summary.ticks);
    println!(
        "  Source switches: {}, drift corrections: {}",
        engine.controller().switches(),
        engine.controller().corrections()
    );
    Ok(())
}
