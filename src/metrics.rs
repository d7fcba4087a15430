//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Dispatcher metrics
    pub static ref EVENTS_PROCESSED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rookery_events_processed_total", "Total number of dispatched events"),
        &["origin", "activity", "object"]
    ).expect("metric can be created");
    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rookery_notifications_created_total", "Total number of notifications created"),
        &["notification_type"]
    ).expect("metric can be created");

    // Timeline metrics
    pub static ref TIMELINE_INGESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rookery_timeline_ingests_total", "Timeline ingest attempts by outcome"),
        &["kind", "outcome"]
    ).expect("metric can be created");
    pub static ref TIMELINE_PAGES_SERVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rookery_timeline_pages_served_total", "Timeline pages served"),
        &["kind"]
    ).expect("metric can be created");
    pub static ref TIMELINE_ENTRIES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("rookery_timeline_entries", "Current number of indexed entries"),
        &["kind"]
    ).expect("metric can be created");
    pub static ref PREPARE_CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rookery_prepare_cache_hits_total", "Prepared-representation cache hits"),
        &["kind"]
    ).expect("metric can be created");
    pub static ref PREPARE_CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rookery_prepare_cache_misses_total", "Prepared-representation cache misses"),
        &["kind"]
    ).expect("metric can be created");

    // Federation metrics
    pub static ref FEDERATION_DELIVERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rookery_federation_deliveries_total", "Outbound federation deliveries"),
        &["activity_type", "status"]
    ).expect("metric can be created");

    // Streaming metrics
    pub static ref STREAM_PUSHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rookery_stream_pushes_total", "Live events pushed to connected clients"),
        &["event_type"]
    ).expect("metric can be created");

    // Error metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rookery_errors_total", "Total number of errors"),
        &["error_type", "component"]
    ).expect("metric can be created");
}

/// Register all instruments with the global registry.
///
/// Called once at startup; duplicate registration errors are ignored so
/// multiple engine instances in one process (tests) don't panic.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(EVENTS_PROCESSED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATIONS_CREATED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TIMELINE_INGESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TIMELINE_PAGES_SERVED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TIMELINE_ENTRIES.clone()));
    let _ = REGISTRY.register(Box::new(PREPARE_CACHE_HITS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PREPARE_CACHE_MISSES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FEDERATION_DELIVERIES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STREAM_PUSHES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));
}
