//! JSON dataset files
//!
//! A dataset is a plain dump of everything the engine reads, used to seed a
//! store at startup.

use anyhow::{bail, Context, Result};
use lapboard_core::model::{
    Competition, CompetitionId, CompetitionTiming, Participant, TimingRecord,
};
use lapboard_core::scoring::ScoringRuleRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A round result tagged with its competition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionResult {
    pub competition_id: CompetitionId,
    #[serde(flatten)]
    pub timing: CompetitionTiming,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub timings: Vec<TimingRecord>,
    #[serde(default)]
    pub competitions: Vec<Competition>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub results: Vec<CompetitionResult>,
    #[serde(default)]
    pub rules: Vec<ScoringRuleRecord>,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Failed to parse dataset {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let dataset: Dataset = serde_json::from_str(raw)?;
        dataset.check()?;
        Ok(dataset)
    }

    /// Reject anything the store would refuse on insert
    fn check(&self) -> Result<()> {
        for record in &self.rules {
            record
                .rule
                .validate()
                .with_context(|| format!("Invalid scoring rule {}", record.id))?;
        }

        let mut ids = HashSet::new();
        for timing in &self.timings {
            if !ids.insert(timing.id) {
                bail!("Duplicate timing id {}", timing.id);
            }
        }

        let rounds: HashMap<CompetitionId, u32> =
            self.competitions.iter().map(|c| (c.id, c.rounds)).collect();

        let mut seen = HashSet::new();
        for result in &self.results {
            let competition = result.competition_id;
            let participant = result.timing.participant_id;
            let round = result.timing.round_number;

            let Some(&total) = rounds.get(&competition) else {
                bail!("Result for unknown competition {}", competition);
            };
            if round == 0 || round > total {
                bail!(
                    "Round {} of competition {} is outside 1..={}",
                    round,
                    competition,
                    total
                );
            }
            if !self
                .participants
                .iter()
                .any(|p| p.id == participant && p.competition_id == competition)
            {
                bail!(
                    "Participant {} is not entered in competition {}",
                    participant,
                    competition
                );
            }
            if !seen.insert((competition, participant, round)) {
                bail!(
                    "Duplicate result for participant {} in round {} of competition {}",
                    participant,
                    round,
                    competition
                );
            }
        }

        Ok(())
    }
}
