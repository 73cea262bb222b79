//! Render-context scheduler driving the animation from its own thread.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::animation::AnimationEngine;
use super::store::BarStore;

/// Receives the displayed bars and the dirty flag after every tick.
pub type FrameCallback = Box<dyn FnMut(&[f32], bool) + Send>;

/// Commands sent to the ticker thread
enum TickerCommand {
    Stop,
}

/// Handle to a thread that ticks a [`BarStore`] at a fixed interval.
///
/// Dropping the handle stops the thread.
pub struct Ticker {
    command_tx: mpsc::Sender<TickerCommand>,
    thread_handle: Option<JoinHandle<u64>>,
}

impl Ticker {
    pub fn spawn(
        store: Arc<BarStore>,
        engine: AnimationEngine,
        interval: Duration,
        mut on_frame: FrameCallback,
    ) -> std::io::Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();

        let thread_handle = thread::Builder::new()
            .name("bar-ticker".to_string())
            .spawn(move || {
                let mut ticks = 0u64;
                loop {
                    match command_rx.recv_timeout(interval) {
                        Ok(TickerCommand::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {}
                    }

                    let dirty = store.tick(&engine);
                    let bars = store.snapshot();
                    on_frame(&bars, dirty);
                    ticks += 1;
                }
                log::debug!("Ticker stopped after {} ticks", ticks);
                ticks
            })?;

        Ok(Self {
            command_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Stops the thread and returns how many ticks it ran.
    pub fn stop(&mut self) -> u64 {
        let _ = self.command_tx.send(TickerCommand::Stop);
        match self.thread_handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                log::warn!("Ticker thread panicked");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
