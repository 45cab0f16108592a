use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,pickup_core=debug";
#[cfg(not(any(target_os = "android", target_os = "ios")))]
const LOG_FILE_NAME: &str = "pickup.log";

static INIT: Once = Once::new();

/// Install the process-wide subscriber. Later calls are no-ops.
pub fn init_logging(data_dir: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let registry = tracing_subscriber::registry().with(filter);

        #[cfg(target_os = "ios")]
        let result = {
            let _ = data_dir;
            registry
                .with(tracing_oslog::OsLogger::new("com.pickupapp.core", "default"))
                .try_init()
        };

        #[cfg(target_os = "android")]
        let result = {
            let _ = data_dir;
            registry.with(paranoid_android::layer("pickup_core")).try_init()
        };

        #[cfg(not(any(target_os = "android", target_os = "ios")))]
        let result = {
            let file_layer = open_log_file(data_dir).map(|file| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
            });
            registry
                .with(tracing_subscriber::fmt::layer())
                .with(file_layer)
                .try_init()
        };

        if let Err(e) = result {
            // Someone else (a test harness, the host app) already installed one.
            eprintln!("pickup_core: logging not initialized: {e}");
        }
    });
}

#[cfg(not(any(target_os = "android", target_os = "ios")))]
fn open_log_file(data_dir: &str) -> Option<std::fs::File> {
    use anyhow::Context;

    let path = std::path::Path::new(data_dir).join(LOG_FILE_NAME);
    let opened = std::fs::create_dir_all(data_dir)
        .and_then(|_| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
        })
        .with_context(|| format!("open {}", path.display()));
    match opened {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("pickup_core: {e:#}");
            None
        }
    }
}
