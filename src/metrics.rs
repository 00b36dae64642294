//! Prometheus metrics shared by the pipeline and the HTTP layer.

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub symbols_processed_total: IntCounter,
    pub symbols_failed_total: IntCounter,
    pub bars_inserted_total: IntCounter,
    pub bars_updated_total: IntCounter,
    pub bars_unchanged_total: IntCounter,
    pub composite_signals_total: IntCounter,
    pub symbol_duration_seconds: Histogram,
    pub batches_in_flight: IntGauge,

    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,

    pub database_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("stocksignal".to_string()), None)?;

        let symbols_processed_total =
            IntCounter::new("symbols_processed_total", "Symbols that finished their pipeline")?;
        let symbols_failed_total =
            IntCounter::new("symbols_failed_total", "Symbols whose pipeline failed")?;
        let bars_inserted_total = IntCounter::new("bars_inserted_total", "Price bars inserted")?;
        let bars_updated_total = IntCounter::new("bars_updated_total", "Price bars updated")?;
        let bars_unchanged_total =
            IntCounter::new("bars_unchanged_total", "Fetched bars already stored within tolerance")?;
        let composite_signals_total =
            IntCounter::new("composite_signals_total", "Composite signals written")?;
        let symbol_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("symbol_duration_seconds", "Per-symbol pipeline duration")
                .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        let batches_in_flight = IntGauge::new("batches_in_flight", "Batches currently running")?;

        let http_requests_total = IntCounter::new("http_requests_total", "HTTP requests served")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency",
        ))?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests being served")?;

        let database_connected = Gauge::new("database_connected", "1 when the database is reachable")?;

        registry.register(Box::new(symbols_processed_total.clone()))?;
        registry.register(Box::new(symbols_failed_total.clone()))?;
        registry.register(Box::new(bars_inserted_total.clone()))?;
        registry.register(Box::new(bars_updated_total.clone()))?;
        registry.register(Box::new(bars_unchanged_total.clone()))?;
        registry.register(Box::new(composite_signals_total.clone()))?;
        registry.register(Box::new(symbol_duration_seconds.clone()))?;
        registry.register(Box::new(batches_in_flight.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;

        Ok(Self {
            registry,
            symbols_processed_total,
            symbols_failed_total,
            bars_inserted_total,
            bars_updated_total,
            bars_unchanged_total,
            composite_signals_total,
            symbol_duration_seconds,
            batches_in_flight,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            database_connected,
        })
    }

    /// Text exposition format for `/metrics`.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
