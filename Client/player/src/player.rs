//! Playback driver: owns the heuristics engine behind a command queue
//! and simulates the downloader and the stat timer against local files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use abr_heuristics::{
    EventCallback, HeuristicsConfig, HeuristicsEngine, HeuristicsEvent, StreamTopology,
    HNS_PER_SECOND,
};
use fmp4_box::ChunkParser;
use smooth_manifest::{ManifestInfo, MediaType};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Media length assumed for chunks whose real length is unknown.
const FALLBACK_CHUNK_HNS: i64 = 2 * HNS_PER_SECOND;

// Everything that mutates the engine goes through this queue, so the
// engine sees a strictly serialized command stream.
#[derive(Debug)]
pub enum PlayerCommand {
    Schedule,
    DownloadCompleted {
        stream_index: usize,
        chunk_id: u32,
        bitrate: u64,
        byte_count: u64,
        elapsed: Duration,
    },
    SampleDelivered {
        stream_index: usize,
        chunk_id: u32,
        timestamp_hns: i64,
    },
    SampleRequested {
        stream_index: usize,
    },
    PlaybackStats {
        dropped_fps: f64,
        rendered_fps: f64,
        source_fps: f64,
    },
    Shutdown,
}

pub struct SmoothPlayer {
    command_tx: mpsc::Sender<PlayerCommand>,
    cancellation_token: Arc<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

impl SmoothPlayer {
    pub fn new(
        manifest: &ManifestInfo,
        config: HeuristicsConfig,
        chunk_dir: Option<PathBuf>,
        pipe_bits_per_sec: u64,
        degrade_after: Option<Duration>,
    ) -> SmoothPlayer {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let callback: EventCallback = Arc::new(move |event| {
            let _ = event_tx.send(event);
        });
        let stream_ids: Vec<usize> = manifest
            .streams
            .iter()
            .map(|stream| stream.stream_index)
            .collect();
        let tic_interval = Duration::from_millis(config.tic_interval_ms);
        let engine = HeuristicsEngine::new(topologies(manifest), config, callback);
        let cancellation_token = Arc::new(CancellationToken::new());

        let tasks = vec![
            tokio::spawn(engine_loop(engine, command_rx)),
            tokio::spawn(download_loop(
                event_rx,
                command_tx.clone(),
                chunk_dir,
                pipe_bits_per_sec,
                cancellation_token.clone(),
            )),
            tokio::spawn(stats_loop(
                command_tx.clone(),
                stream_ids,
                tic_interval,
                degrade_after,
                cancellation_token.clone(),
            )),
        ];
        SmoothPlayer {
            command_tx,
            cancellation_token,
            tasks,
        }
    }

    pub async fn start(&self) {
        let _ = self.command_tx.send(PlayerCommand::Schedule).await;
    }

    pub async fn stop(self) {
        self.cancellation_token.cancel();
        let _ = self.command_tx.send(PlayerCommand::Shutdown).await;
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

fn topologies(manifest: &ManifestInfo) -> Vec<StreamTopology> {
    manifest
        .streams
        .iter()
        .map(|stream| {
            let mut chunk_durations_hns = vec![0i64; stream.chunk_count as usize];
            for (&chunk, &duration) in &stream.chunk_durations {
                if let Some(slot) = chunk_durations_hns.get_mut(chunk as usize) {
                    *slot = duration as i64;
                }
            }
            StreamTopology {
                stream_index: stream.stream_index,
                chunk_count: stream.chunk_count,
                bitrates: stream.bitrate_ladder(),
                chunk_durations_hns,
                video: stream.media_type == MediaType::Video,
            }
        })
        .collect()
}

// Single consumer of engine mutations.
async fn engine_loop(mut engine: HeuristicsEngine, mut command_rx: mpsc::Receiver<PlayerCommand>) {
    let mut completion_logged = false;
    while let Some(command) = command_rx.recv().await {
        let now = Instant::now();
        match command {
            PlayerCommand::Schedule => engine.schedule_downloads(now),
            PlayerCommand::DownloadCompleted {
                stream_index,
                chunk_id,
                bitrate,
                byte_count,
                elapsed,
            } => {
                engine.on_download_completed(
                    stream_index,
                    chunk_id,
                    bitrate,
                    byte_count,
                    elapsed,
                    now,
                );
                engine.schedule_downloads(now);
            }
            PlayerCommand::SampleDelivered {
                stream_index,
                chunk_id,
                timestamp_hns,
            } => engine.on_sample_delivered(stream_index, chunk_id, timestamp_hns),
            PlayerCommand::SampleRequested { stream_index } => {
                engine.on_sample_requested(stream_index, now)
            }
            PlayerCommand::PlaybackStats {
                dropped_fps,
                rendered_fps,
                source_fps,
            } => {
                engine.on_playback_stats(now, dropped_fps, rendered_fps, source_fps);
                if engine.is_complete() && !completion_logged {
                    completion_logged = true;
                    info!("all declared chunks fetched");
                }
            }
            PlayerCommand::Shutdown => {
                engine.shutdown();
                break;
            }
        }
    }
}

// Acts on the engine's decisions: fetches chunks from disk (or makes
// them up), extracts frames and reports everything back.
async fn download_loop(
    mut event_rx: mpsc::UnboundedReceiver<HeuristicsEvent>,
    command_tx: mpsc::Sender<PlayerCommand>,
    chunk_dir: Option<PathBuf>,
    pipe_bits_per_sec: u64,
    token: Arc<CancellationToken>,
) {
    // per-stream media clock so frame timestamps stay absolute
    let mut chunk_starts: HashMap<usize, i64> = HashMap::new();
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = event_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        match event {
            HeuristicsEvent::DownloadRequested {
                stream_index,
                chunk_id,
                bitrate,
            } => {
                let start_hns = *chunk_starts.get(&stream_index).unwrap_or(&0);
                let outcome = match read_chunk(&chunk_dir, stream_index, bitrate, chunk_id).await {
                    Some(bytes) => {
                        parse_and_deliver(&command_tx, stream_index, chunk_id, start_hns, &bytes)
                            .await
                    }
                    None => None,
                };
                let (byte_count, media_hns) = outcome.unwrap_or((
                    // nominal bitrate over the fallback chunk length
                    bitrate / 8 * (FALLBACK_CHUNK_HNS / HNS_PER_SECOND) as u64,
                    FALLBACK_CHUNK_HNS,
                ));
                chunk_starts.insert(stream_index, start_hns + media_hns);
                let elapsed = Duration::from_secs_f64(
                    byte_count as f64 * 8.0 / pipe_bits_per_sec.max(1) as f64,
                );
                let _ = command_tx
                    .send(PlayerCommand::DownloadCompleted {
                        stream_index,
                        chunk_id,
                        bitrate,
                        byte_count,
                        elapsed,
                    })
                    .await;
            }
            HeuristicsEvent::DownloadsPaused { at: _ } => {
                info!("downloads paused");
            }
        }
    }
}

async fn read_chunk(
    chunk_dir: &Option<PathBuf>,
    stream_index: usize,
    bitrate: u64,
    chunk_id: u32,
) -> Option<Vec<u8>> {
    let dir = chunk_dir.as_ref()?;
    let path = dir
        .join(stream_index.to_string())
        .join(bitrate.to_string())
        .join(format!("{chunk_id}.m4f"));
    match tokio::fs::read(&path).await {
        Ok(bytes) => Some(bytes),
        Err(error) => {
            debug!(path = %path.display(), %error, "no local chunk, synthesizing");
            None
        }
    }
}

// Returns (chunk size, media length) when the chunk parses.
async fn parse_and_deliver(
    command_tx: &mpsc::Sender<PlayerCommand>,
    stream_index: usize,
    chunk_id: u32,
    start_hns: i64,
    bytes: &[u8],
) -> Option<(u64, i64)> {
    let mut parser = ChunkParser::new();
    parser.feed(bytes);
    match parser.parse_header() {
        Ok(true) => {}
        Ok(false) => {
            warn!(stream = stream_index, chunk = chunk_id, "chunk truncated, skipping");
            return None;
        }
        Err(error) => {
            error!(stream = stream_index, chunk = chunk_id, %error, "chunk rejected");
            return None;
        }
    }
    let mut frames = 0usize;
    loop {
        match parser.next_frame() {
            Ok(Some(frame)) => {
                frames += 1;
                let _ = command_tx
                    .send(PlayerCommand::SampleDelivered {
                        stream_index,
                        chunk_id,
                        timestamp_hns: start_hns + frame.time,
                    })
                    .await;
            }
            Ok(None) => break,
            Err(error) => {
                error!(stream = stream_index, chunk = chunk_id, %error, "frame extraction failed");
                break;
            }
        }
    }
    debug!(
        stream = stream_index,
        chunk = chunk_id,
        frames,
        fps = parser.frame_rate(),
        "chunk delivered"
    );
    let media_hns = if parser.current_time() > 0 {
        parser.current_time()
    } else {
        FALLBACK_CHUNK_HNS
    };
    Some((bytes.len() as u64, media_hns))
}

// Fixed-interval best-effort stat refresh: at most one per tick
// boundary, dropped outright when the consumer is backed up.
async fn stats_loop(
    command_tx: mpsc::Sender<PlayerCommand>,
    stream_ids: Vec<usize>,
    tic_interval: Duration,
    degrade_after: Option<Duration>,
    token: Arc<CancellationToken>,
) {
    let started = Instant::now();
    let mut interval = tokio::time::interval(tic_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        let degraded = degrade_after.is_some_and(|after| started.elapsed() >= after);
        let (dropped_fps, rendered_fps) = if degraded { (9.0, 13.0) } else { (0.0, 30.0) };
        if command_tx
            .try_send(PlayerCommand::PlaybackStats {
                dropped_fps,
                rendered_fps,
                source_fps: 30.0,
            })
            .is_err()
        {
            debug!("stats refresh dropped, consumer backed up");
        }
        for &stream_index in &stream_ids {
            let _ = command_tx.try_send(PlayerCommand::SampleRequested { stream_index });
        }
    }
}
