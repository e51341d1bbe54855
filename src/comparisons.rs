use std::collections::BTreeMap;

use anyhow::{Context, Result};
use itertools::{iproduct, Itertools};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::ComparisonConfig,
    results::{ComparisonFamily, ComparisonResults, ComparisonRow},
    table::{group_by, Construct, GroupAggregate, GroupKey, Quantity, TraceRecord},
    welch::{GroupSummary, WelchTest},
};

/// Welch's-test comparisons over a table of traces
///
/// Three families of tests are run:
/// 1. Additivity: `no_sh` against `bac` for every gene and cycle
/// 2. Across cycles: the reference cycle against every earlier cycle
/// 3. Across genes: every pair of genes within a construct and cycle
pub struct Comparisons<'a> {
    records: &'a [TraceRecord],
    config: ComparisonConfig,
    genes: Vec<String>,
    cycles: Vec<u32>,
    constructs: Vec<Construct>,
}
impl<'a> Comparisons<'a> {
    pub fn new(records: &'a [TraceRecord], config: ComparisonConfig) -> Self {
        let genes = records
            .iter()
            .map(|r| r.key.gene.clone())
            .unique()
            .sorted()
            .collect();
        let cycles = records.iter().map(|r| r.key.cycle).unique().sorted().collect();
        let constructs = records
            .iter()
            .map(|r| r.key.construct)
            .unique()
            .sorted()
            .collect();
        Self {
            records,
            config,
            genes,
            cycles,
            constructs,
        }
    }

    /// Run every comparison family and collect the rows
    pub fn run(&self) -> Result<ComparisonResults> {
        let groups = group_by(self.records, |r| r.key.clone());

        let mut rows = self.additivity(&groups)?;
        rows.extend(self.across_cycles(&groups)?);
        rows.extend(self.across_genes(&groups)?);
        info!("Ran {} Welch's tests", rows.len());

        Ok(ComparisonResults::from_vec(rows, self.config.correction))
    }

    /// Tests whether `no_sh` and `bac` agree for every gene, cycle and quantity
    fn additivity(&self, groups: &Groups) -> Result<Vec<ComparisonRow>> {
        let required = [Construct::Bac, Construct::NoPrimary, Construct::NoShadow];
        if !required.iter().all(|c| self.constructs.contains(c)) {
            warn!("Skipping Welch's test across constructs: some of the constructs were not detected");
            return Ok(Vec::new());
        }

        let combinations = iproduct!(
            self.config.additivity_quantities.iter(),
            self.genes.iter(),
            self.cycles.iter()
        )
        .collect::<Vec<_>>();

        let rows = combinations
            .into_par_iter()
            .map(|(quantity, gene, &cycle)| {
                let no_sh = GroupKey::new(gene.clone(), cycle, Construct::NoShadow);
                let bac = GroupKey::new(gene.clone(), cycle, Construct::Bac);
                compare(groups, ComparisonFamily::Additivity, quantity, no_sh, bac)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    /// Tests the reference cycle against every earlier cycle
    fn across_cycles(&self, groups: &Groups) -> Result<Vec<ComparisonRow>> {
        let reference = self.config.reference_cycle;
        let quantity = &self.config.cycle_quantity;
        let mut rows = Vec::new();
        for (gene, &construct) in iproduct!(self.genes.iter(), self.constructs.iter()) {
            for &cycle in self.cycles.iter().filter(|&&c| c < reference) {
                let reference_key = GroupKey::new(gene.clone(), reference, construct);
                let key = GroupKey::new(gene.clone(), cycle, construct);
                rows.extend(compare(
                    groups,
                    ComparisonFamily::AcrossCycles,
                    quantity,
                    reference_key,
                    key,
                )?);
            }
        }
        Ok(rows)
    }

    /// Tests every pair of genes within a construct and cycle
    fn across_genes(&self, groups: &Groups) -> Result<Vec<ComparisonRow>> {
        if self.genes.len() < 2 {
            warn!("Skipping Welch's test across genes: not enough genes");
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        for (&construct, &cycle) in iproduct!(self.constructs.iter(), self.cycles.iter()) {
            for (gene1, gene2) in self.genes.iter().tuple_combinations() {
                for quantity in &self.config.gene_quantities {
                    let key1 = GroupKey::new(gene1.clone(), cycle, construct);
                    let key2 = GroupKey::new(gene2.clone(), cycle, construct);
                    rows.extend(compare(
                        groups,
                        ComparisonFamily::AcrossGenes,
                        quantity,
                        key1,
                        key2,
                    )?);
                }
            }
        }
        Ok(rows)
    }
}

type Groups<'a> = BTreeMap<GroupKey, Vec<&'a TraceRecord>>;

/// Welch-tests `quantity` between two groups, skipping absent groups
fn compare(
    groups: &Groups,
    family: ComparisonFamily,
    quantity: &Quantity,
    key1: GroupKey,
    key2: GroupKey,
) -> Result<Option<ComparisonRow>> {
    let (Some(x1), Some(x2)) = (
        summarize(groups, quantity, &key1)?,
        summarize(groups, quantity, &key2)?,
    ) else {
        return Ok(None);
    };
    let test = WelchTest::between(&x1, &x2);
    Ok(Some(ComparisonRow::new(family, &quantity.name, key1, key2, test)))
}

fn summarize(
    groups: &Groups,
    quantity: &Quantity,
    key: &GroupKey,
) -> Result<Option<GroupSummary>> {
    let Some(members) = groups.get(key) else {
        debug!("No traces for {key}");
        return Ok(None);
    };
    let summary = quantity
        .summarize(&GroupAggregate::new(members))
        .with_context(|| format!("Summarizing {} for {key}", quantity.name))?;
    Ok(Some(summary))
}

/// Writes the additivity p-values back into the traces
///
/// Every trace of the tested gene and cycle, whatever its construct, receives
/// `"{quantity}_p_value"`.
pub fn annotate_p_values(records: &mut [TraceRecord], results: &ComparisonResults) {
    for row in results.family(ComparisonFamily::Additivity) {
        let column = format!("{}_p_value", row.quantity);
        records
            .iter_mut()
            .filter(|r| r.key.gene == row.group1.gene && r.key.cycle == row.group1.cycle)
            .for_each(|r| r.set_value(&column, row.adjusted_p));
    }
}
