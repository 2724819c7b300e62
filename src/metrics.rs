use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide HTTP request counters.
#[derive(Default)]
pub struct HttpMetrics {
    pub requests_total: AtomicU64,
    pub responses_2xx: AtomicU64,
    pub responses_3xx: AtomicU64,
    pub responses_4xx: AtomicU64,
    pub responses_5xx: AtomicU64,
    pub rate_limited: AtomicU64,
    pub response_time_ms_sum: AtomicU64,
}

impl HttpMetrics {
    pub fn record(&self, status: u16, elapsed_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.response_time_ms_sum.fetch_add(elapsed_ms, Ordering::Relaxed);
        let bucket = match status {
            200..=299 => &self.responses_2xx,
            300..=399 => &self.responses_3xx,
            400..=499 => &self.responses_4xx,
            _ => &self.responses_5xx,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
        if status == 429 {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Serialize to Prometheus text exposition format.
    pub fn to_prometheus_text(&self) -> String {
        let total = self.requests_total.load(Ordering::Relaxed);
        let ok = self.responses_2xx.load(Ordering::Relaxed);
        let redirect = self.responses_3xx.load(Ordering::Relaxed);
        let client_err = self.responses_4xx.load(Ordering::Relaxed);
        let server_err = self.responses_5xx.load(Ordering::Relaxed);
        let limited = self.rate_limited.load(Ordering::Relaxed);
        let time_sum = self.response_time_ms_sum.load(Ordering::Relaxed);

        format!(
            "# HELP cifix_learn_http_requests_total HTTP requests served\n\
             # TYPE cifix_learn_http_requests_total counter\n\
             cifix_learn_http_requests_total{{class=\"2xx\"}} {ok}\n\
             cifix_learn_http_requests_total{{class=\"3xx\"}} {redirect}\n\
             cifix_learn_http_requests_total{{class=\"4xx\"}} {client_err}\n\
             cifix_learn_http_requests_total{{class=\"5xx\"}} {server_err}\n\
             cifix_learn_http_requests_total{{class=\"total\"}} {total}\n\
             # HELP cifix_learn_rate_limited_total Requests rejected by rate limiting\n\
             # TYPE cifix_learn_rate_limited_total counter\n\
             cifix_learn_rate_limited_total {limited}\n\
             # HELP cifix_learn_response_time_ms_sum Sum of response times in milliseconds\n\
             # TYPE cifix_learn_response_time_ms_sum counter\n\
             cifix_learn_response_time_ms_sum {time_sum}\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_buckets_by_status_class() {
        let m = HttpMetrics::default();
        m.record(200, 5);
        m.record(201, 5);
        m.record(404, 1);
        m.record(429, 1);
        m.record(500, 10);

        let text = m.to_prometheus_text();
        assert!(text.contains("cifix_learn_http_requests_total{class=\"2xx\"} 2"));
        assert!(text.contains("cifix_learn_http_requests_total{class=\"4xx\"} 2"));
        assert!(text.contains("cifix_learn_http_requests_total{class=\"5xx\"} 1"));
        assert!(text.contains("cifix_learn_http_requests_total{class=\"total\"} 5"));
        assert!(text.contains("cifix_learn_rate_limited_total 1"));
        assert!(text.contains("cifix_learn_response_time_ms_sum 22"));
    }
}
