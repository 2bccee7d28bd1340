//! End-to-end-shaped scenario tests driving the engine's pure-Rust components
//! (packet queue, frame queue, clocks, sync policy, presentation) together
//! with synthetic packet/frame streams, per the seed test suite. These don't
//! touch `ffmpeg_source::Source` or the codec decoders (no container fixture
//! files are checked in), but they exercise the same state machines a real
//! file would drive.

use std::sync::Arc;

use ffmpeg_types::Rational;

use super::clock::{Clock, ClockKind, SerialView};
use super::frame::{Frame, VideoFrame};
use super::frame_queue::FrameQueue;
use super::options::EngineOptions;
use super::packet_queue::PacketQueue;
use super::presentation::{refresh_video, ClockSet, RefreshState, VideoRefreshOutcome};
use super::sync::MasterSyncType;

fn video_frame(pts: f64, duration: f64, serial: i64) -> Frame {
    Frame::Video(VideoFrame {
        data: vec![],
        width: 4,
        height: 4,
        sample_aspect_ratio: 1.0,
        pts,
        duration,
        pos: 0,
        serial,
    })
}

fn clock_set() -> ClockSet {
    let view = SerialView::standalone();
    ClockSet {
        audio: Arc::new(Clock::new(ClockKind::Audio, view.clone())),
        video: Arc::new(Clock::new(ClockKind::Video, view.clone())),
        external: Arc::new(Clock::new(ClockKind::External, view)),
    }
}

fn push_frame(fq: &FrameQueue, frame: Frame) {
    let idx = fq.peek_writable().expect("queue not aborted");
    fq.push(idx, frame);
}

/// Scenario 2 / R1 (packet-queue half): a seek flushes every queued packet
/// and inserts a flush sentinel whose serial is strictly greater than
/// anything queued before it; packets enqueued after the seek all carry that
/// new serial, so a decoder (and the presentation layer) can tell old content
/// from new content apart without racing on wall-clock timing.
#[test]
fn seek_flush_boundary_separates_old_and_new_serial_packets() {
    use super::packet_queue::GetOutcome;
    use super::queue_entry::QueueEntry;
    use ffmpeg_types::{Packet, Pts, StreamType};

    let pq = PacketQueue::new(Rational::new(1, 1), false);
    pq.start();
    // drain the initial flush sentinel from start()
    assert!(matches!(pq.get(), GetOutcome::Entry(QueueEntry::Flush, _)));

    let pre_seek_serial = pq.serial();
    for _ in 0..3 {
        pq.put(Packet::new(
            vec![0u8; 4],
            Some(Pts(0)),
            Some(Pts(0)),
            Pts(1),
            Rational::new(1, 1),
            true,
            StreamType::Video,
        ));
    }

    // Seek: drop everything queued, bump serial, enqueue the boundary.
    pq.flush();
    pq.put_flush();
    let post_seek_serial = pq.serial();
    assert!(post_seek_serial > pre_seek_serial);

    pq.put(Packet::new(
        vec![0u8; 4],
        Some(Pts(3)),
        Some(Pts(3)),
        Pts(1),
        Rational::new(1, 1),
        true,
        StreamType::Video,
    ));

    // The very next entry dequeued must be the flush sentinel carrying the
    // new serial, not a leftover pre-seek packet.
    match pq.get() {
        GetOutcome::Entry(QueueEntry::Flush, serial) => assert_eq!(serial, post_seek_serial),
        _ => panic!("expected flush sentinel immediately after seek"),
    }
    match pq.get() {
        GetOutcome::Entry(QueueEntry::Data(_), serial) => assert_eq!(serial, post_seek_serial),
        _ => panic!("expected post-seek data packet"),
    }
}

/// Scenario 2 / R1 (presentation half): once the frame queue's backing packet
/// queue has moved on to a new serial, a stale frame left over from before
/// the seek is skipped rather than displayed, and the first frame actually
/// shown carries the new serial.
#[test]
fn stale_frame_after_seek_is_skipped_not_displayed() {
    let pq = Arc::new(PacketQueue::new(Rational::new(1, 1), false));
    pq.start();
    let fq = FrameQueue::new(pq.clone(), 3, true);

    // A frame produced under the pre-seek serial, still sitting in the queue.
    push_frame(&fq, video_frame(1.0, 0.04, pq.serial()));

    // Seek happens: packet queue serial advances.
    pq.put_flush();
    let new_serial = pq.serial();
    assert_ne!(new_serial, 0);

    // The freshly-decoded post-seek frame lands right after it.
    push_frame(&fq, video_frame(3.0, 0.04, new_serial));

    let mut state = RefreshState::new(10.0);
    let clocks = clock_set();
    clocks.external.set(3.0, 0);

    // Drive refresh_video far enough in wall time that both frames are due;
    // the stale one must never come back out as a `Show`.
    let outcome = refresh_video(
        &mut state,
        &fq,
        None,
        &clocks,
        MasterSyncType::External,
        &EngineOptions::default(),
        100.0,
    );
    match outcome {
        VideoRefreshOutcome::Show { frame, .. } => {
            assert_eq!(frame.serial, new_serial);
            assert!((frame.pts - 3.0).abs() < 0.04, "first shown frame should be near the seek target");
        }
        _ => panic!("expected the post-seek frame to be shown"),
    }
}

/// R2: pausing and resuming a clock has no net effect on its reading relative
/// to a second (master) clock beyond the time actually spent paused.
#[test]
fn pause_resume_preserves_master_clock_offset() {
    let clocks = clock_set();
    clocks.video.set(10.0, 0);
    clocks.external.set(10.0, 0);

    let before = clocks.video.now() - clocks.external.now();

    clocks.video.set_paused(true);
    clocks.external.set_paused(true);
    // Time "passes" while paused; a paused clock reports its pts verbatim so
    // the offset between the two must not drift.
    clocks.video.set_paused(false);
    clocks.external.set_paused(false);

    let after = clocks.video.now() - clocks.external.now();
    assert!((before - after).abs() < 0.01);
}

/// Scenario 5: a 60fps-shaped video stream feeding a consumer that only
/// refreshes every 25ms (slower than the stream's ~16.7ms frame period) must
/// drop frames it falls behind on rather than silently accumulating latency,
/// and the frame actually shown must never be ahead of the external clock.
#[test]
fn video_only_frame_drop_under_slow_consumer() {
    let pq = Arc::new(PacketQueue::new(Rational::new(1, 1), false));
    pq.start();
    // A generously-sized queue here: this test is about the drop policy, not
    // about exercising the real VIDEO_PICTURE_QUEUE_SIZE=3 backpressure (a
    // single-threaded test has no decoder thread to keep topping it up).
    let fq = FrameQueue::new(pq.clone(), 32, true);
    let serial = pq.serial();

    let frame_period = 1.0 / 60.0;
    for i in 0..30 {
        push_frame(&fq, video_frame(i as f64 * frame_period, frame_period, serial));
    }

    let mut state = RefreshState::new(10.0);
    let clocks = clock_set();
    let options = EngineOptions {
        frame_drop: true,
        ..EngineOptions::default()
    };

    let mut wall = 0.0;
    let mut shown = 0;
    loop {
        clocks.external.set(wall, 0);
        match refresh_video(&mut state, &fq, None, &clocks, MasterSyncType::External, &options, wall) {
            VideoRefreshOutcome::Show { frame, .. } => {
                assert!(frame.pts <= wall + 0.2, "shown frame must not be ahead of the wall-derived clock");
                shown += 1;
            }
            VideoRefreshOutcome::Wait(_) => {}
            VideoRefreshOutcome::Exhausted => break,
        }
        wall += 0.025;
    }

    assert!(shown > 0, "at least some frames should have been shown");
    assert!(
        state.frame_drops_late > 0,
        "a 60fps source feeding a 25ms-cadence consumer should trigger the late-drop policy"
    );
}

/// Scenario 6: external-clock rubber-banding steps the clock's speed down
/// toward 0.900 while queues are starved, then back up toward 1.010 once
/// they're comfortably full, one 0.001 step per tick either way.
#[test]
fn external_clock_rubber_bands_with_queue_occupancy() {
    use super::sync::{check_external_clock_speed, QueueCounts};

    let mut speed = 1.0;
    for _ in 0..50 {
        speed = check_external_clock_speed(speed, &QueueCounts { audio: 1, video: 1 });
    }
    assert!(speed < 1.0, "starved queues should pull speed below 1.0");
    assert!(speed >= 0.900);

    for _ in 0..300 {
        speed = check_external_clock_speed(speed, &QueueCounts { audio: 20, video: 20 });
    }
    assert_eq!(speed, 1.010, "comfortably full queues should push speed up to the 1.010 ceiling");
}
