//! # Runtime Summary
//!
//! A labeled summary metric for the `prometheus` registry, which ships counters,
//! gauges and histograms but no summary type.
//!
//! Each label set keeps a sliding window of recent observations bounded by age
//! and by sample count. Quantiles are computed exactly over that window at
//! scrape time (nearest rank); `_sum` and `_count` are cumulative for the life
//! of the process, like every other Prometheus summary. An empty window reports
//! `NaN` quantiles.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{LabelPair, Metric, MetricFamily, MetricType, Quantile, Summary};

/// Quantiles reported for every label set
pub const DEFAULT_QUANTILES: [f64; 4] = [0.5, 0.9, 0.95, 0.99];
/// Observations older than this no longer influence quantiles
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10 * 60);
/// Upper bound on retained observations per label set
pub const DEFAULT_MAX_SAMPLES: usize = 1024;

#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub max_age: Duration,
    pub max_samples: usize,
    pub quantiles: Vec<f64>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            max_samples: DEFAULT_MAX_SAMPLES,
            quantiles: DEFAULT_QUANTILES.to_vec(),
        }
    }
}

#[derive(Debug, Default)]
struct SummaryWindow {
    samples: VecDeque<(Instant, f64)>,
    count: u64,
    sum: f64,
}

impl SummaryWindow {
    fn observe(&mut self, value: f64, now: Instant, options: &SummaryOptions) {
        self.count += 1;
        self.sum += value;
        self.samples.push_back((now, value));
        self.prune(now, options);
    }

    fn prune(&mut self, now: Instant, options: &SummaryOptions) {
        while let Some((observed_at, _)) = self.samples.front() {
            if now.saturating_duration_since(*observed_at) > options.max_age {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        while self.samples.len() > options.max_samples {
            self.samples.pop_front();
        }
    }

    fn quantiles(&self, quantiles: &[f64]) -> Vec<(f64, f64)> {
        let mut values: Vec<f64> = self.samples.iter().map(|(_, v)| *v).collect();
        values.sort_by(|a, b| a.total_cmp(b));

        quantiles
            .iter()
            .map(|q| (*q, nearest_rank(&values, *q)))
            .collect()
    }
}

/// Nearest-rank quantile over sorted values; `NaN` when empty
fn nearest_rank(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let rank = (quantile * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

struct SummaryInner {
    desc: Desc,
    label_names: Vec<String>,
    options: SummaryOptions,
    children: DashMap<Vec<String>, Mutex<SummaryWindow>>,
}

/// Summary vector keyed by label values; clones share state
#[derive(Clone)]
pub struct RuntimeSummaryVec {
    inner: Arc<SummaryInner>,
}

impl std::fmt::Debug for RuntimeSummaryVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSummaryVec")
            .field("name", &self.inner.desc.fq_name)
            .field("label_names", &self.inner.label_names)
            .field("series", &self.inner.children.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl RuntimeSummaryVec {
    pub fn new(
        name: &str,
        help: &str,
        label_names: &[&str],
        options: SummaryOptions,
    ) -> prometheus::Result<Self> {
        let label_names: Vec<String> = label_names.iter().map(|l| l.to_string()).collect();
        let desc = Desc::new(
            name.to_string(),
            help.to_string(),
            label_names.clone(),
            HashMap::new(),
        )?;

        Ok(Self {
            inner: Arc::new(SummaryInner {
                desc,
                label_names,
                options,
                children: DashMap::new(),
            }),
        })
    }

    /// Record one observation for the given label values
    pub fn observe(&self, label_values: &[&str], value: f64) -> prometheus::Result<()> {
        if label_values.len() != self.inner.label_names.len() {
            return Err(prometheus::Error::InconsistentCardinality {
                expect: self.inner.label_names.len(),
                got: label_values.len(),
            });
        }

        let now = Instant::now();
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();

        if let Some(window) = self.inner.children.get(&key) {
            window.lock().observe(value, now, &self.inner.options);
            return Ok(());
        }

        self.inner
            .children
            .entry(key)
            .or_default()
            .lock()
            .observe(value, now, &self.inner.options);
        Ok(())
    }

    fn collect_family(&self) -> MetricFamily {
        let now = Instant::now();
        let mut family = MetricFamily::default();
        family.set_name(self.inner.desc.fq_name.clone());
        family.set_help(self.inner.desc.help.clone());
        family.set_field_type(MetricType::SUMMARY);

        for child in self.inner.children.iter() {
            let mut window = child.value().lock();
            window.prune(now, &self.inner.options);

            let mut summary = Summary::default();
            summary.set_sample_count(window.count);
            summary.set_sample_sum(window.sum);
            for (q, value) in window.quantiles(&self.inner.options.quantiles) {
                let mut quantile = Quantile::default();
                quantile.set_quantile(q);
                quantile.set_value(value);
                summary.mut_quantile().push(quantile);
            }
            drop(window);

            let mut metric = Metric::default();
            for (label_name, label_value) in self.inner.label_names.iter().zip(child.key()) {
                let mut pair = LabelPair::default();
                pair.set_name(label_name.clone());
                pair.set_value(label_value.clone());
                metric.mut_label().push(pair);
            }
            metric.set_summary(summary);
            family.mut_metric().push(metric);
        }

        family
    }
}

impl Collector for RuntimeSummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![self.collect_family()]
    }
}
