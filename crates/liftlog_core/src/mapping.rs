//! Exercise to muscle-group mapping table.
//!
//! The table is static, versioned configuration: a list of known exercises
//! and an ordered list of regex rules. [`MuscleGroupMapping::lookup`]
//! resolves a free-form exercise name in this order:
//!
//! 1. exact match on the normalized name
//! 2. the longest known name contained in the query
//! 3. the shortest known name containing the query (queries of 3+ chars)
//! 4. the first matching regex rule
//! 5. `other` / `neutral`

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::utils::normalize_exercise_key;
use crate::{LiftlogError, Result};

const BUILTIN_MAPPING: &str = include_str!("../data/exercise_mapping.json");
const MIN_CONTAINING_QUERY_CHARS: usize = 3;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Arms,
    Legs,
    Core,
    Olympic,
    Cardio,
    Compound,
    Other,
}

impl MuscleGroup {
    pub const ALL: [MuscleGroup; 10] = [
        MuscleGroup::Chest,
        MuscleGroup::Back,
        MuscleGroup::Shoulders,
        MuscleGroup::Arms,
        MuscleGroup::Legs,
        MuscleGroup::Core,
        MuscleGroup::Olympic,
        MuscleGroup::Cardio,
        MuscleGroup::Compound,
        MuscleGroup::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MuscleGroup::Chest => "chest",
            MuscleGroup::Back => "back",
            MuscleGroup::Shoulders => "shoulders",
            MuscleGroup::Arms => "arms",
            MuscleGroup::Legs => "legs",
            MuscleGroup::Core => "core",
            MuscleGroup::Olympic => "olympic",
            MuscleGroup::Cardio => "cardio",
            MuscleGroup::Compound => "compound",
            MuscleGroup::Other => "other",
        }
    }

    pub fn body_region(self) -> Option<BodyRegion> {
        match self {
            MuscleGroup::Chest | MuscleGroup::Back | MuscleGroup::Shoulders | MuscleGroup::Arms => {
                Some(BodyRegion::Upper)
            }
            MuscleGroup::Legs => Some(BodyRegion::Lower),
            MuscleGroup::Core => Some(BodyRegion::Core),
            MuscleGroup::Olympic | MuscleGroup::Compound => Some(BodyRegion::FullBody),
            MuscleGroup::Cardio => Some(BodyRegion::Conditioning),
            MuscleGroup::Other => None,
        }
    }

    /// Groups typically worked alongside a primary group, used when a table
    /// entry does not list its own.
    pub fn default_secondary(self) -> &'static [MuscleGroup] {
        use MuscleGroup::*;
        match self {
            Chest => &[Shoulders, Arms],
            Back => &[Arms, Core],
            Legs => &[Core, Back],
            Shoulders => &[Arms, Chest],
            Arms => &[Shoulders, Chest],
            Core => &[Back, Legs],
            Olympic => &[Legs, Back, Shoulders],
            Cardio => &[Legs, Core],
            Compound | Other => &[],
        }
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MuscleGroup {
    type Err = LiftlogError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        MuscleGroup::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LiftlogError::Mapping(format!("unknown muscle group: {s}")))
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MovementCategory {
    Push,
    Pull,
    Neutral,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BodyRegion {
    Upper,
    Lower,
    Core,
    FullBody,
    Conditioning,
}

/// Which lookup step produced a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    ContainedName,
    ContainingName,
    Pattern,
    Default,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExerciseEntry {
    pub name: String,
    pub group: MuscleGroup,
    pub category: MovementCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Vec<MuscleGroup>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatternRule {
    pub pattern: String,
    pub group: MuscleGroup,
    pub category: MovementCategory,
}

/// On-disk form of the mapping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MappingTable {
    pub version: String,
    pub exercises: Vec<ExerciseEntry>,
    #[serde(default)]
    pub patterns: Vec<PatternRule>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct MappingMatch {
    pub muscle_group: MuscleGroup,
    pub secondary_groups: Vec<MuscleGroup>,
    pub movement_category: MovementCategory,
    pub body_region: Option<BodyRegion>,
    pub match_kind: MatchKind,
    /// Known exercise name or regex that matched, if any.
    pub matched: Option<String>,
}

impl MappingMatch {
    fn from_entry(entry: &ExerciseEntry, match_kind: MatchKind) -> Self {
        let secondary_groups = entry
            .secondary
            .clone()
            .unwrap_or_else(|| entry.group.default_secondary().to_vec());
        Self {
            muscle_group: entry.group,
            secondary_groups,
            movement_category: entry.category,
            body_region: entry.group.body_region(),
            match_kind,
            matched: Some(entry.name.clone()),
        }
    }

    fn unmapped() -> Self {
        Self {
            muscle_group: MuscleGroup::Other,
            secondary_groups: Vec::new(),
            movement_category: MovementCategory::Neutral,
            body_region: None,
            match_kind: MatchKind::Default,
            matched: None,
        }
    }

    pub fn is_miss(&self) -> bool {
        self.match_kind == MatchKind::Default
    }
}

#[derive(Debug)]
struct CompiledRule {
    regex: Regex,
    rule: PatternRule,
}

/// Read-only lookup structure built from a [`MappingTable`].
#[derive(Debug)]
pub struct MuscleGroupMapping {
    table: MappingTable,
    keys: Vec<String>,
    exact: HashMap<String, usize>,
    rules: Vec<CompiledRule>,
}

impl MuscleGroupMapping {
    /// The table compiled into the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_MAPPING)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let table: MappingTable = serde_json::from_str(json)
            .map_err(|e| LiftlogError::Mapping(format!("invalid mapping JSON: {e}")))?;
        Self::from_table(table)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mapping = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            version = %mapping.version(),
            exercises = mapping.table.exercises.len(),
            "loaded exercise mapping"
        );
        Ok(mapping)
    }

    /// Validate and index a table. Duplicate exercise names (after
    /// normalization) and invalid regexes are rejected.
    pub fn from_table(table: MappingTable) -> Result<Self> {
        let mut keys = Vec::with_capacity(table.exercises.len());
        let mut exact = HashMap::with_capacity(table.exercises.len());
        for (idx, entry) in table.exercises.iter().enumerate() {
            let key = normalize_exercise_key(&entry.name);
            if key.is_empty() {
                return Err(LiftlogError::Mapping(format!(
                    "exercise entry {idx} has an empty name"
                )));
            }
            if exact.insert(key.clone(), idx).is_some() {
                return Err(LiftlogError::Mapping(format!(
                    "duplicate exercise in mapping: {}",
                    entry.name
                )));
            }
            keys.push(key);
        }

        let rules = table
            .patterns
            .iter()
            .map(|rule| {
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|regex| CompiledRule {
                        regex,
                        rule: rule.clone(),
                    })
                    .map_err(|e| {
                        LiftlogError::Mapping(format!("invalid pattern {:?}: {e}", rule.pattern))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            table,
            keys,
            exact,
            rules,
        })
    }

    pub fn version(&self) -> &str {
        &self.table.version
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.exercises.is_empty()
    }

    pub fn lookup(&self, exercise_name: &str) -> MappingMatch {
        self.lookup_key(&normalize_exercise_key(exercise_name))
    }

    /// Lookup by an already-normalized key.
    pub fn lookup_key(&self, key: &str) -> MappingMatch {
        if key.is_empty() {
            return MappingMatch::unmapped();
        }

        if let Some(&idx) = self.exact.get(key) {
            return MappingMatch::from_entry(&self.table.exercises[idx], MatchKind::Exact);
        }

        // strict `>` keeps the first entry in table order on ties
        let mut contained: Option<usize> = None;
        for (idx, k) in self.keys.iter().enumerate() {
            if key.contains(k.as_str())
                && contained.is_none_or(|best| k.len() > self.keys[best].len())
            {
                contained = Some(idx);
            }
        }
        if let Some(idx) = contained {
            let matched = &self.table.exercises[idx].name;
            tracing::debug!(key, matched = %matched, "mapped by contained name");
            return MappingMatch::from_entry(&self.table.exercises[idx], MatchKind::ContainedName);
        }

        if key.chars().count() >= MIN_CONTAINING_QUERY_CHARS {
            let mut containing: Option<usize> = None;
            for (idx, k) in self.keys.iter().enumerate() {
                if k.contains(key)
                    && containing.is_none_or(|best| k.len() < self.keys[best].len())
                {
                    containing = Some(idx);
                }
            }
            if let Some(idx) = containing {
                let matched = &self.table.exercises[idx].name;
                tracing::debug!(key, matched = %matched, "mapped by containing name");
                return MappingMatch::from_entry(
                    &self.table.exercises[idx],
                    MatchKind::ContainingName,
                );
            }
        }

        if let Some(compiled) = self.rules.iter().find(|c| c.regex.is_match(key)) {
            tracing::debug!(key, pattern = %compiled.rule.pattern, "mapped by pattern");
            let group = compiled.rule.group;
            return MappingMatch {
                muscle_group: group,
                secondary_groups: group.default_secondary().to_vec(),
                movement_category: compiled.rule.category,
                body_region: group.body_region(),
                match_kind: MatchKind::Pattern,
                matched: Some(compiled.rule.pattern.clone()),
            };
        }

        tracing::debug!(key, "no mapping for exercise");
        MappingMatch::unmapped()
    }
}
