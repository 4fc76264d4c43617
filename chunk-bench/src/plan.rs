use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chunk_engine::{CahnHilliard, ExecConfig, Kernel, SchedulerKind, SimulationParams};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid trial plan: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("invalid value {value:?} for {flag}: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },
    #[error("unknown flag {0}")]
    UnknownFlag(String),
}

/// Everything one benchmark invocation measures. Missing JSON fields take the
/// defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrialPlan {
    pub shape: [usize; 3],
    pub chunk: [usize; 3],
    pub steps: u32,
    pub seed: u64,
    pub physics: CahnHilliard,
    pub backends: Vec<SchedulerKind>,
    pub workers: Vec<usize>,
    pub rounds: NonZeroUsize,
    pub timeout_ms: Option<u64>,
}

impl Default for TrialPlan {
    fn default() -> Self {
        Self {
            shape: [16, 64, 64],
            chunk: [2, 64, 64],
            steps: 10,
            seed: 99,
            physics: CahnHilliard::default(),
            backends: SchedulerKind::ALL.to_vec(),
            workers: vec![1, 2, 4, 8],
            rounds: NonZeroUsize::new(3).unwrap_or(NonZeroUsize::MIN),
            timeout_ms: None,
        }
    }
}

impl TrialPlan {
    pub fn from_json_str(json: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PlanError> {
        let text = std::fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn params(&self) -> SimulationParams {
        SimulationParams::new(self.shape, self.chunk, self.steps).with_seed(self.seed)
    }

    pub fn kernel(&self) -> Kernel {
        Kernel::CahnHilliard(self.physics)
    }

    pub fn exec_config(&self) -> ExecConfig {
        ExecConfig {
            timeout: self.timeout_ms.map(Duration::from_millis),
            ..ExecConfig::default()
        }
    }

    /// Override one field from a command-line flag such as `--steps 20`.
    pub fn apply_flag(&mut self, flag: &str, value: &str) -> Result<(), PlanError> {
        let invalid = |reason: String| PlanError::InvalidValue {
            flag: flag.to_string(),
            value: value.to_string(),
            reason,
        };
        match flag {
            "--shape" => self.shape = parse_triple(value).map_err(invalid)?,
            "--chunk" => self.chunk = parse_triple(value).map_err(invalid)?,
            "--steps" => self.steps = value.parse().map_err(|e| invalid(format!("{}", e)))?,
            "--seed" => self.seed = value.parse().map_err(|e| invalid(format!("{}", e)))?,
            "--rounds" => self.rounds = value.parse().map_err(|e| invalid(format!("{}", e)))?,
            "--workers" => self.workers = parse_list(value).map_err(invalid)?,
            "--backend" => {
                self.backends = if value == "all" {
                    SchedulerKind::ALL.to_vec()
                } else {
                    parse_list(value).map_err(invalid)?
                }
            }
            "--timeout-ms" => {
                self.timeout_ms = Some(value.parse().map_err(|e| invalid(format!("{}", e)))?)
            }
            other => return Err(PlanError::UnknownFlag(other.to_string())),
        }
        Ok(())
    }
}

/// Parse `8,20,20` or `8x20x20`.
pub fn parse_triple(s: &str) -> Result<[usize; 3], String> {
    let parts: Vec<usize> = s
        .split(|c| c == ',' || c == 'x')
        .map(|p| p.trim().parse::<usize>().map_err(|e| e.to_string()))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(format!("expected three dimensions, got {}", parts.len())),
    }
}

/// Parse a comma separated list.
pub fn parse_list<T>(s: &str) -> Result<Vec<T>, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let items: Vec<T> = s
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.trim().parse::<T>().map_err(|e| e.to_string()))
        .collect::<Result<_, _>>()?;
    if items.is_empty() {
        return Err("empty list".to_string());
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_triples() {
        assert_eq!(parse_triple("8,20,20").unwrap(), [8, 20, 20]);
        assert_eq!(parse_triple("1x20x20").unwrap(), [1, 20, 20]);
        assert!(parse_triple("8,20").is_err());
        assert!(parse_triple("a,b,c").is_err());
    }

    #[test]
    fn parses_lists() {
        assert_eq!(parse_list::<usize>("1, 2,4").unwrap(), vec![1, 2, 4]);
        assert!(parse_list::<usize>("").is_err());
        assert!(parse_list::<usize>("1,x").is_err());
    }
}
