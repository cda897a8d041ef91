use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BudgetError {
    #[error("invalid budget tranche {tranche:?} in {input:?}")]
    InvalidTranche { input: String, tranche: String },

    #[error("budget tranches must be positive, got 0 in {input:?}")]
    ZeroTranche { input: String },

    #[error("cannot spend {spent} from an exhausted budget")]
    Exhausted { spent: f64 },
}

/// Ordered spending tranches of a worker, e.g. `10000:20000:30000`.
///
/// Tranches are consumed left to right. The textual form is what gets
/// persisted, so parse -> spend -> display must round-trip exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Budget {
    tranches: Vec<u64>,
}

impl Budget {
    pub fn new(tranches: Vec<u64>) -> Self {
        Self { tranches }
    }

    pub fn tranches(&self) -> &[u64] {
        &self.tranches
    }

    pub fn is_exhausted(&self) -> bool {
        self.tranches.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.tranches.iter().sum()
    }

    /// Current tranche, or 0 when there is none worth an order
    pub fn unit(&self, min_order_budget: u64) -> u64 {
        match self.tranches.first() {
            Some(&tranche) if tranche >= min_order_budget => tranche,
            _ => 0,
        }
    }

    /// Charge `spent` against the current tranche.
    ///
    /// The tranche is dropped instead of shrunk when what would remain is at or
    /// below `min_order_budget`. Fractional spending rounds the remainder down.
    pub fn spend(&mut self, spent: f64, min_order_budget: u64) -> Result<(), BudgetError> {
        let Some(first) = self.tranches.first_mut() else {
            return Err(BudgetError::Exhausted { spent });
        };

        let remainder = *first as f64 - spent.max(0.0);
        if remainder > min_order_budget as f64 {
            *first = remainder.floor() as u64;
        } else {
            self.tranches.remove(0);
        }

        Ok(())
    }
}

impl FromStr for Budget {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }

        let tranches = s
            .split(':')
            .map(|part| {
                let tranche = part.trim().parse::<u64>().map_err(|_| {
                    BudgetError::InvalidTranche {
                        input: s.to_string(),
                        tranche: part.to_string(),
                    }
                })?;
                if tranche == 0 {
                    return Err(BudgetError::ZeroTranche {
                        input: s.to_string(),
                    });
                }
                Ok(tranche)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tranches })
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.tranches.iter().map(u64::to_string).collect();
        f.write_str(&parts.join(":"))
    }
}

impl TryFrom<String> for Budget {
    type Error = BudgetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Budget> for String {
    fn from(budget: Budget) -> Self {
        budget.to_string()
    }
}
