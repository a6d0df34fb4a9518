//! Audio level monitoring
//!
//! Pure signal-processing loops, no protocol state: each monitored stream
//! is sampled on a fixed cadence, and a stream whose mean frequency-domain
//! magnitude exceeds the speaking threshold claims the single
//! active-speaker slot. Last writer wins; concurrent speech is not
//! disambiguated. This is a visual-only approximation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::config::PartyConfig;
use crate::task::TaskGuard;

/// Frequency-domain level probe for one audio stream
///
/// Implemented by the platform layer on top of whatever analyser node or
/// DSP tap it has for the stream.
pub trait LevelSource: Send + 'static {
    /// Fill `buf` with the latest magnitudes (0-255 scale) and return how
    /// many bins were written; `None` once the stream has ended.
    fn sample(&mut self, buf: &mut [u8]) -> Option<usize>;
}

/// Mean magnitude of a bin buffer (0-255 scale)
pub fn mean_magnitude(bins: &[u8]) -> f64 {
    if bins.is_empty() {
        return 0.0;
    }
    bins.iter().map(|&b| b as f64).sum::<f64>() / bins.len() as f64
}

/// The single active-speaker slot of one client view
pub struct ActiveSpeakers {
    tx: watch::Sender<Option<String>>,
}

impl ActiveSpeakers {
    /// Create an empty slot
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Subscribe to active-speaker changes
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    /// The current holder of the slot
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Claim the slot for a speaker
    pub fn mark_speaking(&self, user_id: &str) {
        self.tx.send_if_modified(|current| {
            if current.as_deref() == Some(user_id) {
                false
            } else {
                *current = Some(user_id.to_string());
                true
            }
        });
    }

    /// Release the slot, but only if this speaker still holds it
    pub fn clear_if(&self, user_id: &str) {
        self.tx.send_if_modified(|current| {
            if current.as_deref() == Some(user_id) {
                *current = None;
                true
            } else {
                false
            }
        });
    }
}

impl Default for ActiveSpeakers {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns sampling loops over [`LevelSource`]s
pub struct SpeakerMonitor;

impl SpeakerMonitor {
    /// Monitor the local capture track
    ///
    /// Speaking detection is suppressed while locally muted. Runs until
    /// the source ends or the returned guard is dropped.
    pub fn spawn_local(
        source: Box<dyn LevelSource>,
        user_id: String,
        muted: Arc<AtomicBool>,
        speakers: Arc<ActiveSpeakers>,
        config: &PartyConfig,
    ) -> TaskGuard {
        Self::spawn(source, user_id, Some(muted), speakers, config)
    }

    /// Monitor a received remote stream
    pub fn spawn_remote(
        source: Box<dyn LevelSource>,
        user_id: String,
        speakers: Arc<ActiveSpeakers>,
        config: &PartyConfig,
    ) -> TaskGuard {
        Self::spawn(source, user_id, None, speakers, config)
    }

    fn spawn(
        mut source: Box<dyn LevelSource>,
        user_id: String,
        muted: Option<Arc<AtomicBool>>,
        speakers: Arc<ActiveSpeakers>,
        config: &PartyConfig,
    ) -> TaskGuard {
        let poll = config.level_poll_interval;
        let threshold = config.speaking_threshold as f64;
        let bins = config.frequency_bins;

        TaskGuard::new(tokio::spawn(async move {
            let mut buf = vec![0u8; bins];
            let mut ticker = tokio::time::interval(poll);
            loop {
                ticker.tick().await;

                let Some(written) = source.sample(&mut buf) else {
                    debug!(user = %user_id, "level source ended");
                    speakers.clear_if(&user_id);
                    return;
                };

                let suppressed = muted
                    .as_ref()
                    .is_some_and(|flag| flag.load(Ordering::Relaxed));
                let level = mean_magnitude(&buf[..written.min(buf.len())]);

                if level > threshold && !suppressed {
                    speakers.mark_speaking(&user_id);
                } else {
                    speakers.clear_if(&user_id);
                }
            }
        }))
    }
}
