//! The heuristics facade driven by the player.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::bitrate::BitrateInfo;
use crate::config::HeuristicsConfig;
use crate::monitor::FrameRateMediaInfo;
use crate::sliding_window::SlidingWindow;
use crate::HNS_PER_SECOND;

// Fallback chunk length when the manifest declared none.
const DEFAULT_CHUNK_DURATION_HNS: i64 = 20_000_000;

// Decisions pushed to the owner. The downloader acts on them; the
// engine never touches the network itself.
#[derive(Debug, Clone)]
pub enum HeuristicsEvent {
    DownloadRequested {
        stream_index: usize,
        chunk_id: u32,
        bitrate: u64,
    },
    DownloadsPaused {
        at: Instant,
    },
}

pub type EventCallback = Arc<dyn Fn(HeuristicsEvent) + Send + Sync>;

// Static per-stream shape, lifted from the parsed manifest.
#[derive(Debug, Clone)]
pub struct StreamTopology {
    pub stream_index: usize,
    pub chunk_count: u32,
    // Ascending nominal bitrates.
    pub bitrates: Vec<u64>,
    // Indexed by chunk id, zero where the manifest was silent.
    pub chunk_durations_hns: Vec<i64>,
    pub video: bool,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    chunk_id: u32,
    bitrate: u64,
}

struct StreamState {
    topology: StreamTopology,
    monitor: FrameRateMediaInfo,
    next_chunk: u32,
    in_flight: Option<InFlight>,
    // Ladder index of the most recently buffered chunk.
    playing_index: usize,
    buffered_until_hns: i64,
    position_hns: i64,
    pending_sample_requests: u32,
}

// Synchronous single-consumer decision core. The owner serializes every
// call; nothing in here spawns, blocks or locks.
pub struct HeuristicsEngine {
    config: HeuristicsConfig,
    callback: EventCallback,
    streams: Vec<StreamState>,
    bandwidth: SlidingWindow,
    tics: u64,
    paused: bool,
    seeking: bool,
    minimized: bool,
    shut_down: bool,
}

impl HeuristicsEngine {
    pub fn new(
        topologies: Vec<StreamTopology>,
        config: HeuristicsConfig,
        callback: EventCallback,
    ) -> HeuristicsEngine {
        config.validate();
        let bandwidth = SlidingWindow::new(
            config.bandwidth_window_size,
            config.bandwidth_up_fraction,
            config.bandwidth_down_fraction,
        );
        let streams = topologies
            .into_iter()
            .map(|topology| StreamState {
                monitor: FrameRateMediaInfo::new(
                    topology.stream_index,
                    &topology.bitrates,
                    &config,
                ),
                next_chunk: 0,
                in_flight: None,
                playing_index: 0,
                buffered_until_hns: 0,
                position_hns: 0,
                pending_sample_requests: 0,
                topology,
            })
            .collect();
        HeuristicsEngine {
            config,
            callback,
            streams,
            bandwidth,
            tics: 0,
            paused: false,
            seeking: false,
            minimized: false,
            shut_down: false,
        }
    }

    // Picks the next chunk and bitrate for every idle stream and emits
    // a download request each. No-op while paused or mid-seek.
    pub fn schedule_downloads(&mut self, now: Instant) {
        if self.paused || self.seeking || self.shut_down {
            return;
        }
        let budget = self.bandwidth.kernel() * self.config.bandwidth_safety_fraction;
        for stream in &mut self.streams {
            stream.monitor.check_revocations(now, &self.config);
            if stream.in_flight.is_some() || stream.next_chunk >= stream.topology.chunk_count {
                continue;
            }
            let Some(bitrate) = select_bitrate(&stream.monitor.bitrates, budget) else {
                continue;
            };
            let chunk_id = stream.next_chunk;
            stream.in_flight = Some(InFlight { chunk_id, bitrate });
            debug!(
                stream = stream.topology.stream_index,
                chunk = chunk_id,
                bitrate,
                budget,
                "requesting chunk"
            );
            (self.callback)(HeuristicsEvent::DownloadRequested {
                stream_index: stream.topology.stream_index,
                chunk_id,
                bitrate,
            });
        }
    }

    // Feeds the bandwidth and encoded-bitrate windows and marks the
    // chunk's media buffered.
    pub fn on_download_completed(
        &mut self,
        stream_index: usize,
        chunk_id: u32,
        bitrate: u64,
        byte_count: u64,
        elapsed: Duration,
        now: Instant,
    ) {
        if self.shut_down {
            return;
        }
        let Some(stream) = self
            .streams
            .iter_mut()
            .find(|stream| stream.topology.stream_index == stream_index)
        else {
            warn!(stream = stream_index, "completion for an unknown stream");
            return;
        };
        match stream.in_flight.take() {
            Some(in_flight) if in_flight.chunk_id == chunk_id => {}
            Some(in_flight) => warn!(
                expected = in_flight.chunk_id,
                got = chunk_id,
                "completion out of order"
            ),
            None => debug!(chunk = chunk_id, "completion without a pending request"),
        }
        let duration = chunk_duration_hns(&stream.topology, chunk_id);
        if duration > 0 && byte_count > 0 {
            let media_secs = duration as f64 / HNS_PER_SECOND as f64;
            let encoded = byte_count as f64 * 8.0 / media_secs;
            if let Some(index) = stream
                .monitor
                .bitrates
                .iter()
                .position(|entry| entry.bitrate == bitrate)
            {
                stream.monitor.bitrates[index].encoded_bitrate.add(encoded, now);
                stream.playing_index = index;
            }
        }
        stream.buffered_until_hns = stream.buffered_until_hns.saturating_add(duration);
        stream.next_chunk = stream.next_chunk.max(chunk_id.saturating_add(1));
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 && byte_count > 0 {
            self.bandwidth.add(byte_count as f64 * 8.0 / secs, now);
        }
    }

    // One frame left the buffer for the pipeline.
    pub fn on_sample_delivered(&mut self, stream_index: usize, chunk_id: u32, timestamp_hns: i64) {
        if self.shut_down {
            return;
        }
        let Some(stream) = self
            .streams
            .iter_mut()
            .find(|stream| stream.topology.stream_index == stream_index)
        else {
            return;
        };
        stream.position_hns = stream.position_hns.max(timestamp_hns);
        stream.pending_sample_requests = stream.pending_sample_requests.saturating_sub(1);
        trace!(
            stream = stream_index,
            chunk = chunk_id,
            timestamp = timestamp_hns,
            "sample delivered"
        );
    }

    // The pipeline asked for a frame. Running dry forces the next chunk
    // out of turn at the safest rate.
    pub fn on_sample_requested(&mut self, stream_index: usize, now: Instant) {
        if self.shut_down {
            return;
        }
        let paused = self.paused;
        let Some(stream) = self
            .streams
            .iter_mut()
            .find(|stream| stream.topology.stream_index == stream_index)
        else {
            return;
        };
        stream.pending_sample_requests += 1;
        stream.monitor.check_revocations(now, &self.config);
        let depth = stream.buffered_until_hns.saturating_sub(stream.position_hns);
        if depth > self.config.panic_buffer_hns {
            return;
        }
        if stream.in_flight.is_some() || stream.next_chunk >= stream.topology.chunk_count {
            return;
        }
        if paused {
            warn!(stream = stream_index, depth, "buffer underrun while paused");
            return;
        }
        // budget zero selects the lowest candidate
        let Some(bitrate) = select_bitrate(&stream.monitor.bitrates, 0.0) else {
            return;
        };
        let chunk_id = stream.next_chunk;
        stream.in_flight = Some(InFlight { chunk_id, bitrate });
        warn!(
            stream = stream_index,
            depth,
            pending = stream.pending_sample_requests,
            "buffer underrun, forcing next chunk"
        );
        (self.callback)(HeuristicsEvent::DownloadRequested {
            stream_index,
            chunk_id,
            bitrate,
        });
    }

    // One tic: drive every video stream's frame-rate test.
    pub fn on_playback_stats(
        &mut self,
        now: Instant,
        dropped_fps: f64,
        rendered_fps: f64,
        source_fps: f64,
    ) {
        if self.shut_down || self.seeking {
            return;
        }
        self.tics += 1;
        let tics = self.tics;
        for stream in &mut self.streams {
            if !stream.topology.video {
                continue;
            }
            stream.monitor.test_frame_rate(
                now,
                tics,
                dropped_fps,
                rendered_fps,
                source_fps,
                stream.playing_index,
                &self.config,
            );
            stream.monitor.check_revocations(now, &self.config);
        }
    }

    // Abandons in-flight bookkeeping and retargets every stream at the
    // chunk containing `position_hns`.
    pub fn start_seek(&mut self, position_hns: i64) {
        if self.shut_down {
            return;
        }
        self.seeking = true;
        for stream in &mut self.streams {
            stream.in_flight = None;
            stream.pending_sample_requests = 0;
            let (chunk, chunk_start) = chunk_at(&stream.topology, position_hns);
            stream.next_chunk = chunk;
            stream.buffered_until_hns = chunk_start;
            stream.position_hns = position_hns;
            stream.monitor.reset_windows();
            stream.monitor.arm_transient();
        }
        info!(position = position_hns, "seek started");
    }

    pub fn end_seek(&mut self, now: Instant) {
        if self.shut_down || !self.seeking {
            return;
        }
        self.seeking = false;
        info!("seek finished");
        self.schedule_downloads(now);
    }

    pub fn pause_downloads(&mut self, now: Instant) {
        if self.paused || self.shut_down {
            return;
        }
        self.paused = true;
        info!("downloads paused");
        (self.callback)(HeuristicsEvent::DownloadsPaused { at: now });
    }

    pub fn resume_downloads(&mut self, now: Instant) {
        if !self.paused || self.shut_down {
            return;
        }
        self.paused = false;
        info!("downloads resumed");
        self.schedule_downloads(now);
    }

    // Clamps selection to [min, max]; an empty intersection keeps the
    // lowest entry so playback can always limp along.
    pub fn set_bitrate_range(&mut self, min_bitrate: Option<u64>, max_bitrate: Option<u64>) {
        if self.shut_down {
            return;
        }
        for stream in &mut self.streams {
            let ladder = &mut stream.monitor.bitrates;
            for entry in ladder.iter_mut() {
                let above_min = min_bitrate.map_or(true, |min| entry.bitrate >= min);
                let below_max = max_bitrate.map_or(true, |max| entry.bitrate <= max);
                entry.usable = above_min && below_max;
            }
            if !ladder.iter().any(|entry| entry.usable) {
                warn!(
                    stream = stream.topology.stream_index,
                    "bitrate range excludes the whole ladder, keeping the lowest entry"
                );
                if let Some(first) = ladder.first_mut() {
                    first.usable = true;
                }
            }
        }
    }

    // Minimized windows stop rendering and the stat readings turn into
    // garbage. Entering arms the longer safety period; restoring undoes
    // the suspensions the garbage caused.
    pub fn set_minimized(&mut self, minimized: bool, now: Instant) {
        if self.shut_down || self.minimized == minimized {
            return;
        }
        self.minimized = minimized;
        for stream in &mut self.streams {
            if !stream.topology.video {
                continue;
            }
            if minimized {
                stream.monitor.arm_transient();
            } else {
                stream.monitor.undo_recent_suspensions(now, &self.config);
                stream.monitor.arm_transient();
            }
        }
        info!(minimized, "window state changed");
    }

    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        for stream in &mut self.streams {
            stream.in_flight = None;
        }
        info!("heuristics engine shut down");
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn bandwidth_kernel(&self) -> f64 {
        self.bandwidth.kernel()
    }

    pub fn buffer_depth_hns(&self, stream_index: usize) -> Option<i64> {
        self.streams
            .iter()
            .find(|stream| stream.topology.stream_index == stream_index)
            .map(|stream| stream.buffered_until_hns.saturating_sub(stream.position_hns))
    }

    // Every declared chunk requested and completed.
    pub fn is_complete(&self) -> bool {
        self.streams.iter().all(|stream| {
            stream.in_flight.is_none() && stream.next_chunk >= stream.topology.chunk_count
        })
    }
}

// Highest supported entry whose effective rate fits the budget; the
// lowest supported entry when nothing fits or no estimate exists yet.
fn select_bitrate(ladder: &[BitrateInfo], budget: f64) -> Option<u64> {
    let mut fallback = None;
    let mut best = None;
    for entry in ladder {
        if !entry.supported || !entry.usable {
            continue;
        }
        if fallback.is_none() {
            fallback = Some(entry.bitrate);
        }
        if budget > 0.0 && entry.effective_bitrate() <= budget {
            best = Some(entry.bitrate);
        }
    }
    best.or(fallback)
}

fn chunk_duration_hns(topology: &StreamTopology, chunk_id: u32) -> i64 {
    match topology.chunk_durations_hns.get(chunk_id as usize) {
        Some(&duration) if duration > 0 => duration,
        _ => DEFAULT_CHUNK_DURATION_HNS,
    }
}

// Chunk containing `position_hns` and that chunk's start time.
fn chunk_at(topology: &StreamTopology, position_hns: i64) -> (u32, i64) {
    let mut start = 0i64;
    let mut chunk = 0u32;
    while chunk < topology.chunk_count {
        let duration = chunk_duration_hns(topology, chunk);
        if position_hns < start.saturating_add(duration) || chunk + 1 == topology.chunk_count {
            break;
        }
        start = start.saturating_add(duration);
        chunk += 1;
    }
    (chunk, start)
}
