//! Effect size measurement for perch hypothesis tests
//!
//! Effect sizes quantify how strong an association or difference is, next to
//! the p-value that says whether it is distinguishable from noise.
//!
//! # Supported Effect Sizes
//!
//! - **Cramér's V**: association strength for a chi-square independence test
//! - **Rank-biserial correlation**: companion of the Mann–Whitney U test
//! - **Correlation**: Spearman's rho wrapped with its interpretation
//!
//! # Examples
//!
//! ```rust
//! use perch_effect::{u_statistic, RankBiserial};
//!
//! let fast = vec![0.5, 1.0, 1.5, 2.0];
//! let slow = vec![3.0, 4.0, 5.0, 6.0];
//!
//! let u = u_statistic(&fast, &slow);
//! let effect = RankBiserial::new().from_u(u, fast.len(), slow.len())?;
//! assert_eq!(effect.magnitude, 1.0);
//! # Ok::<(), perch_core::Error>(())
//! ```

mod cramers_v;
mod rank_biserial;
mod traits;
mod types;

pub use cramers_v::CramersV;
pub use rank_biserial::{u_statistic, RankBiserial};
pub use traits::ContingencyEffectSize;
pub use types::{EffectSize, EffectSizeInterpretation, EffectSizeType};

/// Wrap a correlation coefficient of `n` pairs as an effect size
pub fn correlation_effect(rho: f64, n: usize) -> EffectSize {
    EffectSize::new(rho, EffectSizeType::Correlation, Some((n, n)))
}

