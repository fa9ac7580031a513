//! Debounced config writer
//!
//! Config edits arrive as change events on a channel. The writer keeps the
//! newest one and arms a timer; every further edit restarts it, so a burst
//! of edits collapses into a single write once things settle. Shutdown and
//! explicit flushes write immediately.

use crossbeam::channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{save_engine_config, ConfigError, ConfigResult, ConfigStorage, EngineConfig};

/// Quiet period before a pending change is written
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Wake-up interval while nothing is pending
const IDLE_WAIT: Duration = Duration::from_secs(1);

enum PersistCommand {
    Changed(EngineConfig),
    Flush(tokio::sync::oneshot::Sender<ConfigResult<()>>),
    Shutdown,
}

struct PersistService {
    storage: Box<dyn ConfigStorage>,
    key: String,
    debounce: Duration,
    command_rx: Receiver<PersistCommand>,
    pending: Option<EngineConfig>,
    deadline: Option<Instant>,
}

impl PersistService {
    fn run(mut self) {
        log::info!("Config writer started (debounce {:?})", self.debounce);

        loop {
            let wait = self
                .deadline
                .map(|d| d.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_WAIT);

            crossbeam::select! {
                recv(self.command_rx) -> cmd => match cmd {
                    Ok(PersistCommand::Changed(config)) => {
                        self.pending = Some(config);
                        self.deadline = Some(Instant::now() + self.debounce);
                    }
                    Ok(PersistCommand::Flush(reply)) => {
                        let _ = reply.send(self.write_pending());
                    }
                    Ok(PersistCommand::Shutdown) | Err(_) => {
                        if let Err(e) = self.write_pending() {
                            log::warn!("Final config write failed: {}", e);
                        }
                        break;
                    }
                },
                default(wait) => {
                    if self.deadline.is_some_and(|d| Instant::now() >= d) {
                        if let Err(e) = self.write_pending() {
                            log::warn!("Config write failed: {}", e);
                        }
                    }
                }
            }
        }

        log::info!("Config writer stopped");
    }

    fn write_pending(&mut self) -> ConfigResult<()> {
        self.deadline = None;
        match self.pending.take() {
            Some(config) => {
                save_engine_config(&mut self.storage, &self.key, &config)?;
                log::debug!("Engine config written to '{}'", self.key);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Handle to the writer thread; flushes and joins on drop
pub struct PersistHandle {
    command_tx: Sender<PersistCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PersistHandle {
    /// Spawn the writer on its own thread
    pub fn spawn(storage: Box<dyn ConfigStorage>, key: &str, debounce: Duration) -> ConfigResult<Self> {
        let (command_tx, command_rx) = crossbeam::channel::unbounded();
        let service = PersistService {
            storage,
            key: key.to_string(),
            debounce,
            command_rx,
            pending: None,
            deadline: None,
        };

        let handle = thread::Builder::new()
            .name("config-persist".into())
            .spawn(move || service.run())
            .map_err(|e| ConfigError::Storage(e.into()))?;

        Ok(Self {
            command_tx,
            thread_handle: Some(handle),
        })
    }

    /// Record a change; written once no further change arrives for the debounce period
    pub fn mark_dirty(&self, config: EngineConfig) {
        if self.command_tx.send(PersistCommand::Changed(config)).is_err() {
            log::warn!("Config writer stopped; change not persisted");
        }
    }

    /// Write any pending change now and wait for the result
    pub fn flush(&self) -> ConfigResult<()> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.command_tx
            .send(PersistCommand::Flush(reply_tx))
            .map_err(|_| ConfigError::WriterStopped)?;
        reply_rx.blocking_recv().map_err(|_| ConfigError::WriterStopped)?
    }

    /// Flush pending changes and stop the writer
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = self.command_tx.send(PersistCommand::Shutdown);
            if handle.join().is_err() {
                log::error!("Config writer thread panicked");
            }
        }
    }
}

impl Drop for PersistHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_engine_config, LoadOutcome, MemoryStorage, ENGINE_CONFIG_KEY};

    fn spawn(storage: &MemoryStorage, debounce: Duration) -> PersistHandle {
        PersistHandle::spawn(Box::new(storage.clone()), ENGINE_CONFIG_KEY, debounce).unwrap()
    }

    #[test]
    fn test_burst_collapses_into_one_write() {
        let storage = MemoryStorage::new();
        let persist = spawn(&storage, Duration::from_millis(100));

        for level in 0..10u8 {
            let config = EngineConfig {
                active_volume_level: level % 2,
                idle_volume: 50 + level as u16,
                ..EngineConfig::default()
            };
            persist.mark_dirty(config);
        }
        assert_eq!(storage.writes(), 0, "nothing written inside the window");

        thread::sleep(Duration::from_millis(400));
        assert_eq!(storage.writes(), 1);

        let (config, outcome) = load_engine_config(&mut storage.clone(), ENGINE_CONFIG_KEY);
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(config.idle_volume, 59, "last change wins");
    }

    #[test]
    fn test_each_change_restarts_the_timer() {
        let storage = MemoryStorage::new();
        let persist = spawn(&storage, Duration::from_millis(200));
        for _ in 0..5 {
            persist.mark_dirty(EngineConfig::default());
            thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(storage.writes(), 0);
        thread::sleep(Duration::from_millis(500));
        assert_eq!(storage.writes(), 1);
    }

    #[test]
    fn test_shutdown_flushes_pending_write() {
        let storage = MemoryStorage::new();
        let persist = spawn(&storage, Duration::from_secs(60));
        persist.mark_dirty(EngineConfig {
            rev_volume: 42,
            ..EngineConfig::default()
        });
        persist.shutdown();
        assert_eq!(storage.writes(), 1);
        let (config, _) = load_engine_config(&mut storage.clone(), ENGINE_CONFIG_KEY);
        assert_eq!(config.rev_volume, 42);
    }

    #[test]
    fn test_flush_writes_now() {
        let storage = MemoryStorage::new();
        let persist = spawn(&storage, Duration::from_secs(60));
        persist.flush().unwrap();
        assert_eq!(storage.writes(), 0, "nothing pending, nothing written");

        persist.mark_dirty(EngineConfig::default());
        persist.flush().unwrap();
        assert_eq!(storage.writes(), 1);
        drop(persist);
        assert_eq!(storage.writes(), 1, "no second write on drop");
    }
}
