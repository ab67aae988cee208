use crate::model::Turn;

/// Pronunciation and grammar scores pulled from turn feedback, in turn order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSeries {
    pub pronunciation: Vec<f64>,
    pub grammar: Vec<f64>,
}

impl ScoreSeries {
    /// Collects every numeric `overall_score`; malformed feedback is skipped.
    pub fn from_turns<'a>(turns: impl IntoIterator<Item = &'a Turn>) -> Self {
        let mut series = Self::default();
        for turn in turns {
            if let Some(score) = turn.pronunciation.as_ref().and_then(|f| f.overall_score()) {
                series.pronunciation.push(score);
            }
            if let Some(score) = turn.grammar.as_ref().and_then(|f| f.overall_score()) {
                series.grammar.push(score);
            }
        }
        series
    }

    #[must_use]
    pub fn average_pronunciation(&self) -> f64 {
        mean(&self.pronunciation)
    }

    #[must_use]
    pub fn average_grammar(&self) -> f64 {
        mean(&self.grammar)
    }
}

/// Arithmetic mean; `0.0` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    mean_opt(values).unwrap_or(0.0)
}

/// Arithmetic mean; `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_opt(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
