use std::fmt;

use itertools::Itertools;

use crate::{config::PValueCorrection, table::GroupKey, welch::WelchTest};

/// Which hypothesis a comparison row tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComparisonFamily {
    /// `no_sh` against `bac` within a gene and cycle
    Additivity,
    /// A reference cycle against an earlier cycle within a gene and construct
    AcrossCycles,
    /// Two genes within a construct and cycle
    AcrossGenes,
}
impl fmt::Display for ComparisonFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComparisonFamily::Additivity => "additivity",
            ComparisonFamily::AcrossCycles => "across_cycles",
            ComparisonFamily::AcrossGenes => "across_genes",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonRow {
    pub family: ComparisonFamily,
    pub quantity: String,
    pub group1: GroupKey,
    pub group2: GroupKey,
    pub test: WelchTest,
    pub adjusted_p: f64,
}
impl ComparisonRow {
    /// Creates a new ComparisonRow
    ///
    /// `adjusted_p` starts as the raw p-value and is replaced when the results
    /// are collected under a correction.
    pub fn new(
        family: ComparisonFamily,
        quantity: &str,
        group1: GroupKey,
        group2: GroupKey,
        test: WelchTest,
    ) -> Self {
        Self {
            family,
            quantity: quantity.to_string(),
            group1,
            group2,
            adjusted_p: test.p,
            test,
        }
    }
}

pub struct ComparisonResults {
    pub rows: Vec<ComparisonRow>,
}
impl ComparisonResults {
    /// Sorts the rows and corrects p-values within each (family, quantity)
    pub fn from_vec(mut rows: Vec<ComparisonRow>, correction: PValueCorrection) -> Self {
        rows.sort_by(|a, b| {
            (a.family, &a.quantity, &a.group1, &a.group2).cmp(&(
                b.family,
                &b.quantity,
                &b.group1,
                &b.group2,
            ))
        });

        let families = {
            let chunks = rows
                .iter()
                .enumerate()
                .chunk_by(|(_, row)| (row.family, row.quantity.clone()));
            let families = chunks
                .into_iter()
                .map(|(_, members)| members.map(|(i, _)| i).collect::<Vec<_>>())
                .collect::<Vec<_>>();
            families
        };

        for indices in families {
            let raw = indices.iter().map(|&i| rows[i].test.p).collect::<Vec<_>>();
            for (i, p) in indices.into_iter().zip(correction.correct(&raw)) {
                rows[i].adjusted_p = p;
            }
        }

        Self { rows }
    }

    pub fn family(&self, family: ComparisonFamily) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(move |row| row.family == family)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn pprint(&self) {
        println!("Family\tQuantity\tGroup 1\tGroup 2\tt\tnu\tp\tAdjusted p");
        for row in &self.rows {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{:.2e}\t{:.2e}",
                row.family,
                row.quantity,
                row.group1,
                row.group2,
                row.test.t,
                row.test.nu,
                row.test.p,
                row.adjusted_p
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{table::Construct, welch::welchs_test};
    use approx::assert_relative_eq;

    fn row(family: ComparisonFamily, quantity: &str, gene: &str, p_shift: f64) -> ComparisonRow {
        let test = welchs_test(p_shift, 1.0, 20.0, 0.0, 1.0, 20.0);
        ComparisonRow::new(
            family,
            quantity,
            GroupKey::new(gene.to_string(), 14, Construct::NoShadow),
            GroupKey::new(gene.to_string(), 14, Construct::Bac),
            test,
        )
    }

    #[test]
    fn test_rows_are_sorted() {
        let rows = vec![
            row(ComparisonFamily::AcrossGenes, "tau", "hb", 0.1),
            row(ComparisonFamily::Additivity, "r", "sn", 0.1),
            row(ComparisonFamily::Additivity, "r", "hb", 0.1),
        ];
        let results = ComparisonResults::from_vec(rows, PValueCorrection::Identity);
        assert_eq!(results.rows[0].group1.gene, "hb");
        assert_eq!(results.rows[1].group1.gene, "sn");
        assert_eq!(results.rows[2].family, ComparisonFamily::AcrossGenes);
        assert_eq!(results.family(ComparisonFamily::Additivity).count(), 2);
    }

    #[test]
    fn test_correction_is_per_family_and_quantity() {
        let rows = vec![
            row(ComparisonFamily::Additivity, "r", "hb", 1.0),
            row(ComparisonFamily::Additivity, "r", "kn", 1.0),
            row(ComparisonFamily::Additivity, "j", "hb", 1.0),
        ];
        let results = ComparisonResults::from_vec(rows, PValueCorrection::Bonferroni);
        let j = &results.rows[0];
        assert_eq!(j.quantity, "j");
        assert_relative_eq!(j.adjusted_p, j.test.p);
        for r in &results.rows[1..] {
            assert_relative_eq!(r.adjusted_p, (r.test.p * 2.0).min(1.0));
        }
    }

    #[test]
    fn test_identity_keeps_raw_p() {
        let results = ComparisonResults::from_vec(
            vec![row(ComparisonFamily::AcrossCycles, "alpha_comb", "hb", 0.5)],
            PValueCorrection::Identity,
        );
        assert_eq!(results.len(), 1);
        assert_relative_eq!(results.rows[0].adjusted_p, results.rows[0].test.p);
    }
}
