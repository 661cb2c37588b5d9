use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("imrank_search_count", "count of the search requests", &["mode", "index"])
        .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "imrank_search_duration",
        "duration of the search in seconds",
        &["mode", "index"]
    )
    .unwrap()
});

static METRIC_INDEXED_IMAGES: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("imrank_indexed_images", "number of images in the index").unwrap()
});

/// 记录一次搜索的模式、索引类型和耗时
pub fn inc_search(mode: &str, index: &str, duration: f32) {
    METRIC_SEARCH_COUNT.with_label_values(&[mode, index]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[mode, index]).observe(duration as f64);
}

pub fn set_indexed_images(count: usize) {
    METRIC_INDEXED_IMAGES.set(count as i64);
}

/// 以文本格式导出所有指标
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&gather()).unwrap_or_default()
}
