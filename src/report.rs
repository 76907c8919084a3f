//! Console report of a top-1 prediction.
use std::fmt;

use crate::vision::imagenet::Prediction;

/// Arg-max index plus the decoded top-1 row.
#[derive(Debug, Clone)]
pub struct Report<'a> {
    pub argmax: i64,
    pub prediction: &'a Prediction,
}

impl<'a> Report<'a> {
    pub fn new(argmax: i64, prediction: &'a Prediction) -> Self {
        Report { argmax, prediction }
    }

    pub fn print(&self) {
        print!("{self}")
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "argmax={}", self.argmax)?;
        writeln!(f)?;
        writeln!(f, "class_name | class_description | score")?;
        writeln!(f, "-----------+-------------------+------")?;
        writeln!(
            f,
            "{:>10} | {:>17} | {:.3}",
            self.prediction.class_name, self.prediction.description, self.prediction.score
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_descriptions_are_not_truncated() {
        let prediction = Prediction {
            index: 0,
            class_name: "n01440764".to_string(),
            description: "a_very_long_class_description".to_string(),
            score: 1.0,
        };
        let report = Report::new(0, &prediction).to_string();
        assert!(report.ends_with(" n01440764 | a_very_long_class_description | 1.000\n"));
    }
}
