//! Canonical cohort schema shared by training and serving
//!
//! Every column name, aggregation rule and the ordered feature list live
//! here. The trainer and the prediction service both assemble features
//! through this module, and each persisted model records [`SCHEMA_VERSION`]
//! together with its feature names so that drift is detectable at load time.
//!
//! Bump [`SCHEMA_VERSION`] whenever the feature order, a derived-feature
//! formula or an aggregation rule changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CohortError;

/// Version tag persisted alongside every trained model
pub const SCHEMA_VERSION: u32 = 1;

/// Additive smoothing applied to both sides of the growth ratios
pub const GROWTH_EPSILON: f64 = 1e-6;

/// Aggregation granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Micro,
    Mid,
    Macro,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Micro, Level::Mid, Level::Macro];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Micro => "micro",
            Level::Mid => "mid",
            Level::Macro => "macro",
        }
    }

    /// Dimensions that take part in the grouping key (besides `date_idx`)
    pub fn key_dimensions(self) -> &'static [Dimension] {
        match self {
            Level::Micro => &[Dimension::OptGroup, Dimension::ConvWindow, Dimension::Country],
            Level::Mid => &[Dimension::OptGroup],
            Level::Macro => &[],
        }
    }

    /// Categorical model features, in feature-matrix order
    pub fn categorical(self) -> &'static [Dimension] {
        match self {
            Level::Micro => &[Dimension::Country, Dimension::ConvWindow, Dimension::OptGroup],
            Level::Mid => &[Dimension::OptGroup],
            Level::Macro => &[],
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = CohortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "micro" => Ok(Level::Micro),
            "mid" => Ok(Level::Mid),
            "macro" => Ok(Level::Macro),
            other => Err(CohortError::UnsupportedLevel(other.to_string())),
        }
    }
}

/// Forecast target; each maps to a 90-day ROAS label column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Iap,
    Iaa,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Iap, Target::Iaa];

    pub fn as_str(self) -> &'static str {
        match self {
            Target::Iap => "iap",
            Target::Iaa => "iaa",
        }
    }

    /// Regression label. Only read at training time.
    pub fn label_column(self) -> Column {
        match self {
            Target::Iap => Column::Metric(Metric::IapRoas, Day::D90),
            Target::Iaa => Column::Metric(Metric::IaaRoas, Day::D90),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = CohortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iap" => Ok(Target::Iap),
            "iaa" => Ok(Target::Iaa),
            other => Err(CohortError::UnsupportedTarget(other.to_string())),
        }
    }
}

/// Categorical cohort dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    OptGroup,
    ConvWindow,
    Country,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::OptGroup, Dimension::ConvWindow, Dimension::Country];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::OptGroup => "opt_group_map",
            Dimension::ConvWindow => "conv_window_map",
            Dimension::Country => "country_map",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Dimension::OptGroup => 0,
            Dimension::ConvWindow => 1,
            Dimension::Country => 2,
        }
    }
}

/// Elapsed day of a time-series metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Day {
    D0,
    D1,
    D3,
    D7,
    D90,
}

impl Day {
    pub const ALL: [Day; 5] = [Day::D0, Day::D1, Day::D3, Day::D7, Day::D90];

    /// Days observable at inference time
    pub const OBSERVED: [Day; 4] = [Day::D0, Day::D1, Day::D3, Day::D7];

    pub fn number(self) -> u32 {
        match self {
            Day::D0 => 0,
            Day::D1 => 1,
            Day::D3 => 3,
            Day::D7 => 7,
            Day::D90 => 90,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Day::D0 => 0,
            Day::D1 => 1,
            Day::D3 => 2,
            Day::D7 => 3,
            Day::D90 => 4,
        }
    }
}

/// How a metric family re-aggregates across rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Plain additive count
    Sum,
    /// Ratio over cost: revenue is reconstructed as `value * cost`
    Cost,
    /// Ratio over installs: views are reconstructed as `value * installs`
    Installs,
}

/// Time-series metric family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Payers,
    IaaRoas,
    IapRoas,
    RvAcpu,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Payers, Metric::IaaRoas, Metric::IapRoas, Metric::RvAcpu];

    pub fn prefix(self) -> &'static str {
        match self {
            Metric::Payers => "payers_d",
            Metric::IaaRoas => "iaa_roas_d",
            Metric::IapRoas => "iap_roas_d",
            Metric::RvAcpu => "rv_acpu_d",
        }
    }

    pub fn weighting(self) -> Weighting {
        match self {
            Metric::Payers => Weighting::Sum,
            Metric::IaaRoas | Metric::IapRoas => Weighting::Cost,
            Metric::RvAcpu => Weighting::Installs,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Metric::Payers => 0,
            Metric::IaaRoas => 1,
            Metric::IapRoas => 2,
            Metric::RvAcpu => 3,
        }
    }
}

/// A raw cohort column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    DateIdx,
    Installs,
    Cost,
    Cpi,
    Dimension(Dimension),
    Metric(Metric, Day),
}

/// Columns without which no frame is accepted
pub const REQUIRED_COLUMNS: [Column; 3] = [Column::DateIdx, Column::Installs, Column::Cost];

impl Column {
    /// Every column of the raw schema
    pub fn all() -> impl Iterator<Item = Column> {
        [Column::DateIdx, Column::Installs, Column::Cost, Column::Cpi]
            .into_iter()
            .chain(Dimension::ALL.into_iter().map(Column::Dimension))
            .chain(
                Metric::ALL
                    .into_iter()
                    .flat_map(|m| Day::ALL.into_iter().map(move |d| Column::Metric(m, d))),
            )
    }

    pub fn name(&self) -> String {
        match self {
            Column::DateIdx => "date_idx".to_string(),
            Column::Installs => "installs".to_string(),
            Column::Cost => "cost".to_string(),
            Column::Cpi => "cpi".to_string(),
            Column::Dimension(dim) => dim.name().to_string(),
            Column::Metric(metric, day) => format!("{}{}", metric.prefix(), day.number()),
        }
    }

    /// Resolve a header name against the canonical schema
    pub fn from_name(name: &str) -> Option<Column> {
        Column::all().find(|c| c.name() == name)
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Column::Dimension(_))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Features computed from an aggregated row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Derived {
    PayerRateD7,
    IaaGrowth07,
    IapGrowth07,
    RvGrowth07,
    LogInstalls,
    LogCost,
}

impl Derived {
    pub const ALL: [Derived; 6] = [
        Derived::PayerRateD7,
        Derived::IaaGrowth07,
        Derived::IapGrowth07,
        Derived::RvGrowth07,
        Derived::LogInstalls,
        Derived::LogCost,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Derived::PayerRateD7 => "payer_rate_d7",
            Derived::IaaGrowth07 => "iaa_growth_0_7",
            Derived::IapGrowth07 => "iap_growth_0_7",
            Derived::RvGrowth07 => "rv_growth_0_7",
            Derived::LogInstalls => "log_installs",
            Derived::LogCost => "log_cost",
        }
    }

    /// Columns the formula reads; the feature exists only if all are present
    pub fn inputs(self) -> &'static [Column] {
        match self {
            Derived::PayerRateD7 => &[Column::Metric(Metric::Payers, Day::D7), Column::Installs],
            Derived::IaaGrowth07 => &[
                Column::Metric(Metric::IaaRoas, Day::D0),
                Column::Metric(Metric::IaaRoas, Day::D7),
            ],
            Derived::IapGrowth07 => &[
                Column::Metric(Metric::IapRoas, Day::D0),
                Column::Metric(Metric::IapRoas, Day::D7),
            ],
            Derived::RvGrowth07 => &[
                Column::Metric(Metric::RvAcpu, Day::D0),
                Column::Metric(Metric::RvAcpu, Day::D7),
            ],
            Derived::LogInstalls => &[Column::Installs],
            Derived::LogCost => &[Column::Cost],
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Derived::PayerRateD7 => 0,
            Derived::IaaGrowth07 => 1,
            Derived::IapGrowth07 => 2,
            Derived::RvGrowth07 => 3,
            Derived::LogInstalls => 4,
            Derived::LogCost => 5,
        }
    }
}

/// A numeric model feature: either a raw column or a derived one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Column(Column),
    Derived(Derived),
}

impl Feature {
    pub fn name(&self) -> String {
        match self {
            Feature::Column(column) => column.name(),
            Feature::Derived(derived) => derived.name().to_string(),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Canonical numeric feature order consumed by the model.
///
/// `date_idx, installs, cpi, cost`, then `payers`, `iaa_roas`, `iap_roas`,
/// `rv_acpu` for days 0/1/3/7, then the derived features. The 90-day columns
/// are labels and never appear here.
pub fn numeric_features() -> Vec<Feature> {
    let mut features = vec![
        Feature::Column(Column::DateIdx),
        Feature::Column(Column::Installs),
        Feature::Column(Column::Cpi),
        Feature::Column(Column::Cost),
    ];
    for metric in Metric::ALL {
        for day in Day::OBSERVED {
            features.push(Feature::Column(Column::Metric(metric, day)));
        }
    }
    features.extend(Derived::ALL.into_iter().map(Feature::Derived));
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names_round_trip() {
        for column in Column::all() {
            assert_eq!(Column::from_name(&column.name()), Some(column));
        }
        assert_eq!(Column::from_name("iaa_roas_d90"), Some(Column::Metric(Metric::IaaRoas, Day::D90)));
        assert_eq!(Column::from_name("iaa_roas_d2"), None);
    }

    #[test]
    fn test_numeric_feature_order() {
        let names: Vec<String> = numeric_features().iter().map(Feature::name).collect();
        assert_eq!(names.len(), 26);
        assert_eq!(&names[..4], &["date_idx", "installs", "cpi", "cost"]);
        assert_eq!(names[4], "payers_d0");
        assert_eq!(names[8], "iaa_roas_d0");
        assert_eq!(names[19], "rv_acpu_d7");
        assert_eq!(names[20], "payer_rate_d7");
        assert_eq!(names[25], "log_cost");
        assert!(!names.iter().any(|n| n.ends_with("_d90")));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("mid".parse::<Level>().unwrap(), Level::Mid);
        assert!(matches!(
            "weekly".parse::<Level>(),
            Err(CohortError::UnsupportedLevel(name)) if name == "weekly"
        ));
        assert!("IAA".parse::<Target>().is_err());
    }

    #[test]
    fn test_target_labels() {
        assert_eq!(Target::Iap.label_column().name(), "iap_roas_d90");
        assert_eq!(Target::Iaa.label_column().name(), "iaa_roas_d90");
    }
}
