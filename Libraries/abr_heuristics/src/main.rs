//! Scenario runner for the bitrate heuristics.
//!
//! Usage: abr_heuristics [tics]
//!
//! Simulates one video stream on a pipe that collapses halfway through
//! the run, with frame rates degrading at the same point, and prints
//! every decision the engine makes. Handy for eyeballing suspension and
//! revocation behavior without a player attached.

use std::env;
use std::process;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use abr_heuristics::{
    EventCallback, HeuristicsConfig, HeuristicsEngine, HeuristicsEvent, StreamTopology,
    HNS_PER_SECOND,
};

const CHUNK_SECS: i64 = 2;

fn main() {
    let mut args = env::args().skip(1);
    let total_tics: u64 = match args.next().map(|raw| raw.parse()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            eprintln!("usage: abr_heuristics [tics]");
            process::exit(1);
        }
        None => 40,
    };

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: EventCallback = Arc::new(move |event| sink.lock().unwrap().push(event));

    let chunk_count = total_tics as u32;
    let topology = StreamTopology {
        stream_index: 0,
        chunk_count,
        bitrates: vec![750_000, 1_500_000, 3_000_000],
        chunk_durations_hns: vec![CHUNK_SECS * HNS_PER_SECOND; chunk_count as usize],
        video: true,
    };
    let mut engine =
        HeuristicsEngine::new(vec![topology], HeuristicsConfig::default(), callback);

    let start = Instant::now();
    let half = total_tics / 2;
    for tic in 1..=total_tics {
        let now = start + Duration::from_secs(tic);
        // the pipe and the decoder both fall over at the halfway point
        let pipe_bits_per_sec = if tic < half { 6_000_000.0 } else { 1_200_000.0 };
        let (dropped, rendered) = if tic < half { (0.0, 30.0) } else { (9.0, 13.0) };

        engine.schedule_downloads(now);
        let drained: Vec<HeuristicsEvent> = events.lock().unwrap().drain(..).collect();
        for event in drained {
            match event {
                HeuristicsEvent::DownloadRequested {
                    stream_index,
                    chunk_id,
                    bitrate,
                } => {
                    println!("[t={tic:3}] fetch stream {stream_index} chunk {chunk_id} @ {bitrate} b/s");
                    let byte_count = (bitrate as i64 * CHUNK_SECS / 8) as u64;
                    let elapsed =
                        Duration::from_secs_f64(byte_count as f64 * 8.0 / pipe_bits_per_sec);
                    engine.on_download_completed(
                        stream_index,
                        chunk_id,
                        bitrate,
                        byte_count,
                        elapsed,
                        now,
                    );
                }
                HeuristicsEvent::DownloadsPaused { at } => {
                    let offset = at.duration_since(start).as_secs();
                    println!("[t={tic:3}] downloads paused at +{offset}s");
                }
            }
        }

        engine.on_sample_requested(0, now);
        engine.on_sample_delivered(0, (tic / 2) as u32, tic as i64 * HNS_PER_SECOND);
        engine.on_playback_stats(now, dropped, rendered, 30.0);

        if tic % 5 == 0 {
            let depth = engine.buffer_depth_hns(0).unwrap_or(0) / HNS_PER_SECOND;
            println!(
                "[t={tic:3}] bandwidth kernel {:.0} b/s, buffer {depth}s",
                engine.bandwidth_kernel()
            );
        }
    }
    engine.shutdown();
}
