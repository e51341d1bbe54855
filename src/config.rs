use adjustp::{adjust, Procedure};
use bon::Builder;

use crate::table::Quantity;

/// Number of bootstrap repetitions used when none is configured
pub const DEFAULT_BOOTSTRAP_REPETITIONS: usize = 1000;

/// Configuration shared by the bootstrap mixers
#[derive(Debug, Clone, Copy, Builder)]
pub struct BootstrapConfig {
    /// Bootstrap repetitions used to estimate the covariance of the medians
    #[builder(default = DEFAULT_BOOTSTRAP_REPETITIONS)]
    pub n_bootstrap: usize,
    /// Log the weight vector and `estimate +- sd` of every mixture
    #[builder(default)]
    pub verbose: bool,
}
impl Default for BootstrapConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Multiple-testing correction applied to a family of p-values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PValueCorrection {
    #[default]
    Identity,
    Fdr,
    Bonferroni,
}
impl PValueCorrection {
    /// Corrects the finite p-values; NaN entries are passed through and do not
    /// count towards the family size.
    pub fn correct(&self, pvalues: &[f64]) -> Vec<f64> {
        let procedure = match self {
            PValueCorrection::Identity => return pvalues.to_vec(),
            PValueCorrection::Fdr => Procedure::BenjaminiHochberg,
            PValueCorrection::Bonferroni => Procedure::Bonferroni,
        };
        let finite = pvalues
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let mut corrected = pvalues.to_vec();
        if finite.is_empty() {
            return corrected;
        }
        let subset = finite.iter().map(|&i| pvalues[i]).collect::<Vec<_>>();
        for (i, p) in finite.into_iter().zip(adjust(&subset, procedure)) {
            corrected[i] = p;
        }
        corrected
    }
}

/// Quantities and reference points of the Welch comparison families
#[derive(Debug, Clone, Builder)]
pub struct ComparisonConfig {
    /// Quantities tested for additivity across constructs
    #[builder(default = default_additivity_quantities())]
    pub additivity_quantities: Vec<Quantity>,
    /// Quantity compared between the reference cycle and earlier cycles
    #[builder(default = Quantity::summarized("alpha_comb"))]
    pub cycle_quantity: Quantity,
    #[builder(default = 14)]
    pub reference_cycle: u32,
    /// Quantities compared between pairs of genes
    #[builder(default = vec![Quantity::summarized("alpha_comb"), Quantity::summarized("tau")])]
    pub gene_quantities: Vec<Quantity>,
    #[builder(default)]
    pub correction: PValueCorrection,
}
impl Default for ComparisonConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn default_additivity_quantities() -> Vec<Quantity> {
    vec![
        Quantity::observed("r"),
        Quantity::observed("j"),
        Quantity::summarized("alpha_over_k_comb"),
        Quantity::summarized("tau"),
        Quantity::summarized("alpha_comb"),
    ]
}
