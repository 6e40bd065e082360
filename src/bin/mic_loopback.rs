//! Microphone loopback: everything the mic hears comes back out the
//! speaker after a full encode/decode round trip. Useful for checking a
//! board's audio path end to end without a server.
//!
//! Runs the pipeline the way the client does, with three caller-owned
//! contexts: a capture thread polling `read`, a "network" hop feeding
//! captured frames straight back through `write`, and a playback thread
//! polling `drain_playback`. Press Enter to stop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use xiaozhi_audio::{AudioConfig, AudioPipeline, enumerate_devices};

fn main() -> Result<()> {
    env_logger::init();

    let config = AudioConfig {
        // loopback plays the mic's own frames, so decode at the encode rate
        output_sample_rate: 16000,
        ..AudioConfig::default()
    };

    match enumerate_devices(config.input_sample_rate) {
        Ok(devices) => {
            for d in &devices {
                log::info!(
                    "device {}: \"{}\" ({}) in={} out={} rate={}",
                    d.index,
                    d.name,
                    d.description,
                    d.max_input_channels,
                    d.max_output_channels,
                    d.default_sample_rate,
                );
            }
        }
        Err(e) => log::warn!("device listing failed: {e}"),
    }

    let frame_interval = Duration::from_millis(config.frame_duration_ms as u64);
    let batch = config.playback_batch_frames;
    let pipeline =
        Arc::new(AudioPipeline::new(config).context("failed to initialize audio pipeline")?);
    let stop = Arc::new(AtomicBool::new(false));

    let capture_thread = {
        let pipeline = Arc::clone(&pipeline);
        let stop = Arc::clone(&stop);
        thread::Builder::new().name("loopback-capture".into()).spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match pipeline.read() {
                    Some(frame) => pipeline.write(frame),
                    None => thread::sleep(frame_interval / 2),
                }
            }
        })?
    };

    let playback_thread = {
        let pipeline = Arc::clone(&pipeline);
        let stop = Arc::clone(&stop);
        thread::Builder::new().name("loopback-playback".into()).spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if pipeline.drain_playback(batch) == 0 {
                    thread::sleep(frame_interval / 2);
                }
            }
        })?
    };

    println!("loopback running, press Enter to stop");
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    stop.store(true, Ordering::Relaxed);
    let _ = capture_thread.join();
    let _ = playback_thread.join();

    pipeline.await_playback_drained(Duration::from_secs(2));
    pipeline.close();
    Ok(())
}
