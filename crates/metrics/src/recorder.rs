//! Recorder installation and text rendering.

use {anyhow::Result, tracing::info};

/// Access to the installed recorder's current values.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Whether a recorder is installed behind this handle.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle.is_some()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            false
        }
    }

    /// Render every recorded metric in Prometheus text format. Empty when
    /// no recorder is installed.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(metrics_exporter_prometheus::PrometheusHandle::render)
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    pub enabled: bool,
    /// Labels attached to every metric.
    pub global_labels: Vec<(String, String)>,
}

/// Install the process-wide recorder.
///
/// Call once at startup. Without the `prometheus` feature, or with
/// `enabled = false`, nothing is installed and the facade stays a no-op.
///
/// # Errors
///
/// Fails when a recorder is already installed.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle::default());
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = prometheus_builder(config).install_recorder()?;
        info!("prometheus metrics recorder installed");
        Ok(MetricsHandle {
            prometheus_handle: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle::default())
    }
}

#[cfg(feature = "prometheus")]
fn prometheus_builder(
    config: MetricsRecorderConfig,
) -> metrics_exporter_prometheus::PrometheusBuilder {
    let mut builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder
}
