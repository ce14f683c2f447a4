//! Concurrency sizing.
//!
//! # Responsibilities
//! - Decide the number of non-blocking I/O worker threads
//! - Decide whether handlers run inline or on an ordered executor pool

use std::sync::Arc;

use crate::concurrency::dispatch::DispatchStrategy;
use crate::concurrency::ordered::OrderedExecutor;
use crate::config::ServerSettings;
use crate::error::DispatchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyConfigurator {
    name: String,
    io_thread_count: usize,
    executor_thread_count: usize,
}

impl ConcurrencyConfigurator {
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            name: settings.name.clone(),
            io_thread_count: settings.io_thread_count,
            executor_thread_count: settings.executor_thread_count,
        }
    }

    /// I/O worker threads; 0 selects twice the available processors.
    pub fn io_worker_threads(&self) -> usize {
        if self.io_thread_count == 0 {
            num_cpus::get() * 2
        } else {
            self.io_thread_count
        }
    }

    pub fn executor_threads(&self) -> usize {
        self.executor_thread_count
    }

    /// Inline dispatch when the executor pool size is 0, otherwise a new pool.
    pub fn build_strategy(&self) -> Result<DispatchStrategy, DispatchError> {
        if self.executor_thread_count == 0 {
            return Ok(DispatchStrategy::Inline);
        }
        let pool = OrderedExecutor::new(&self.name, self.executor_thread_count)?;
        Ok(DispatchStrategy::Pooled(Arc::new(pool)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_io_threads_uses_twice_cpus() {
        let configurator = ConcurrencyConfigurator::from_settings(&ServerSettings::default());
        assert_eq!(configurator.io_worker_threads(), num_cpus::get() * 2);

        let settings = ServerSettings {
            io_thread_count: 3,
            ..ServerSettings::default()
        };
        assert_eq!(
            ConcurrencyConfigurator::from_settings(&settings).io_worker_threads(),
            3
        );
    }

    #[test]
    fn executor_size_selects_strategy() {
        let inline = ConcurrencyConfigurator::from_settings(&ServerSettings::default());
        assert!(inline.build_strategy().unwrap().is_inline());

        let settings = ServerSettings {
            executor_thread_count: 2,
            ..ServerSettings::default()
        };
        let strategy = ConcurrencyConfigurator::from_settings(&settings)
            .build_strategy()
            .unwrap();
        let pool = strategy.executor().unwrap();
        assert_eq!(pool.size(), 2);
        pool.shutdown(Duration::from_secs(1));
    }
}
