//! Per-trace records and their grouping by (gene, cycle, construct)

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
};

use anyhow::{bail, ensure, Context, Result};
use derive_new::new;
use tracing::{debug, warn};

use crate::{
    bootstrap::BootstrapMixer,
    error::MixError,
    math::{nan_count, nan_mean, nan_variance},
    welch::GroupSummary,
};

/// Genetic construct a trace was recorded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Construct {
    Bac,
    NoPrimary,
    NoShadow,
}
impl Construct {
    pub fn as_str(&self) -> &'static str {
        match self {
            Construct::Bac => "bac",
            Construct::NoPrimary => "no_pr",
            Construct::NoShadow => "no_sh",
        }
    }
}
impl FromStr for Construct {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bac" => Ok(Construct::Bac),
            "no_pr" => Ok(Construct::NoPrimary),
            "no_sh" => Ok(Construct::NoShadow),
            _ => bail!("Unknown construct: {s}"),
        }
    }
}
impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key identifying one experimental group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, new)]
pub struct GroupKey {
    pub gene: String,
    /// Nuclear cycle
    pub cycle: u32,
    pub construct: Construct,
}
impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, nc{}, {}", self.gene, self.cycle, self.construct)
    }
}

/// One trace and the quantities measured or derived for it
#[derive(Debug, Clone, new)]
pub struct TraceRecord {
    pub key: GroupKey,
    #[new(default)]
    pub values: HashMap<String, f64>,
}
impl TraceRecord {
    pub fn with_value(mut self, column: &str, value: f64) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }

    /// Value of `column`, NaN when the record does not carry it
    pub fn value(&self, column: &str) -> f64 {
        self.values.get(column).copied().unwrap_or(f64::NAN)
    }

    pub fn set_value(&mut self, column: &str, value: f64) {
        self.values.insert(column.to_string(), value);
    }
}

/// Groups records by an arbitrary composite key
pub fn group_by<K, F>(records: &[TraceRecord], key_fn: F) -> BTreeMap<K, Vec<&TraceRecord>>
where
    K: Ord,
    F: Fn(&TraceRecord) -> K,
{
    let mut groups: BTreeMap<K, Vec<&TraceRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(key_fn(record)).or_default().push(record);
    }
    groups
}

/// Column aggregations over one group of records
#[derive(Debug, Clone, Copy, new)]
pub struct GroupAggregate<'a> {
    records: &'a [&'a TraceRecord],
}
impl GroupAggregate<'_> {
    pub fn has_column(&self, column: &str) -> bool {
        self.records.iter().any(|r| r.values.contains_key(column))
    }

    pub fn column(&self, column: &str) -> Vec<f64> {
        self.records.iter().map(|r| r.value(column)).collect()
    }

    /// First non-NaN value of the column
    pub fn first(&self, column: &str) -> f64 {
        self.records
            .iter()
            .map(|r| r.value(column))
            .find(|v| !v.is_nan())
            .unwrap_or(f64::NAN)
    }

    pub fn mean(&self, column: &str) -> f64 {
        nan_mean(&self.column(column))
    }

    pub fn variance(&self, column: &str) -> f64 {
        nan_variance(&self.column(column))
    }

    pub fn count(&self, column: &str) -> usize {
        nan_count(&self.column(column))
    }
}

/// How the summary statistics of a quantity are derived from a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityPolicy {
    /// Measured per trace: sample mean and unbiased variance across the group
    Observed,
    /// Already combined per group: the stored value and its stored variance
    Summarized { variance_column: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantity {
    pub name: String,
    pub policy: QuantityPolicy,
}
impl Quantity {
    pub fn observed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: QuantityPolicy::Observed,
        }
    }

    /// A summarized quantity whose variance is stored in `"{name}V"`
    pub fn summarized(name: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: QuantityPolicy::Summarized {
                variance_column: format!("{name}V"),
            },
        }
    }

    pub fn summarize(&self, group: &GroupAggregate) -> Result<GroupSummary> {
        ensure!(
            group.has_column(&self.name),
            "Column {} is missing from the group",
            self.name
        );
        let n = group.count(&self.name) as f64;
        let summary = match &self.policy {
            QuantityPolicy::Observed => {
                GroupSummary::new(group.mean(&self.name), group.variance(&self.name), n)
            }
            QuantityPolicy::Summarized { variance_column } => {
                ensure!(
                    group.has_column(variance_column),
                    "Variance column {variance_column} is missing from the group"
                );
                GroupSummary::new(group.first(&self.name), group.first(variance_column), n)
            }
        };
        Ok(summary)
    }
}

/// Combines two per-trace columns within every (gene, cycle, construct) group
///
/// The bootstrap mix of each group is written to `target` and its variance to
/// `"{target}V"` on every record of the group. Groups whose covariance is
/// singular receive NaN.
pub fn mix_columns(
    records: &mut [TraceRecord],
    sources: [&str; 2],
    target: &str,
    mixer: &BootstrapMixer,
) -> Result<()> {
    for source in sources {
        ensure!(
            records.iter().any(|r| r.values.contains_key(source)),
            "Column {source} is missing from the table"
        );
    }

    let mut members: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        members.entry(record.key.clone()).or_default().push(i);
    }

    let columns = members
        .values()
        .map(|indices| {
            sources.map(|s| {
                indices
                    .iter()
                    .map(|&i| records[i].value(s))
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();
    let jobs = columns
        .iter()
        .map(|[a, b]| [a.as_slice(), b.as_slice()])
        .collect::<Vec<_>>();
    let mixtures = mixer.mix_batch(jobs.as_slice());

    let variance_column = format!("{target}V");
    for ((key, indices), mixture) in members.iter().zip(mixtures) {
        let (estimate, variance) = match mixture {
            Ok(mixture) => {
                if mixture.n_valid < 2 {
                    debug!("{} paired entries while mixing {target} for {key}", mixture.n_valid);
                }
                (mixture.estimate, mixture.variance)
            }
            Err(MixError::SingularCovariance) => {
                warn!("Singular covariance while mixing {target} for {key}");
                (f64::NAN, f64::NAN)
            }
            Err(err) => return Err(err).with_context(|| format!("Mixing {target} for {key}")),
        };
        for &i in indices {
            records[i].set_value(target, estimate);
            records[i].set_value(&variance_column, variance);
        }
    }
    Ok(())
}
