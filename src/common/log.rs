//! Logging helpers
//!
//! Installs `env_logger` behind the `log` facade.

/// Initialize the global logger
///
/// `RUST_LOG` wins over `level` when set. Calling this more than once is
/// harmless; later calls are ignored.
///
/// # Parameters
///
/// * `level` - Default log level (error, warn, info, debug, trace)
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    let _ = env_logger::Builder::from_env(env).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger() {
        // Global state: just make sure repeated init does not panic
        init_logger("debug");
        init_logger("info");
    }
}
