//! Muscle-group enrichment of normalized records.

use std::collections::{BTreeMap, HashMap};

use schemars::JsonSchema;
use serde::Serialize;

use crate::mapping::{
    BodyRegion, MappingMatch, MatchKind, MovementCategory, MuscleGroup, MuscleGroupMapping,
};
use crate::normalize::NormalizedSetRecord;
use crate::observability;
use crate::utils::normalize_exercise_key;

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct EnrichedSetRecord {
    pub record: NormalizedSetRecord,
    pub muscle_group: MuscleGroup,
    pub secondary_groups: Vec<MuscleGroup>,
    pub movement_category: MovementCategory,
    pub body_region: Option<BodyRegion>,
    pub match_kind: MatchKind,
}

impl EnrichedSetRecord {
    pub fn new(record: NormalizedSetRecord, hit: MappingMatch) -> Self {
        Self {
            record,
            muscle_group: hit.muscle_group,
            secondary_groups: hit.secondary_groups,
            movement_category: hit.movement_category,
            body_region: hit.body_region,
            match_kind: hit.match_kind,
        }
    }

    pub fn exercise(&self) -> &str {
        &self.record.set.exercise_name
    }

    pub fn date(&self) -> chrono::NaiveDate {
        self.record.set.date
    }

    pub fn is_valid(&self) -> bool {
        self.record.is_valid
    }
}

/// An exercise name that fell through to the default group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub struct MappingMiss {
    pub exercise: String,
    pub occurrences: usize,
}

#[derive(Clone, Debug, Serialize, JsonSchema)]
pub struct EnrichedBatch {
    pub records: Vec<EnrichedSetRecord>,
    /// Most frequent first, then by name.
    pub misses: Vec<MappingMiss>,
    pub mapping_version: String,
}

/// Tag every record with its muscle group. Each distinct exercise key is
/// looked up once.
pub fn enrich(records: Vec<NormalizedSetRecord>, mapping: &MuscleGroupMapping) -> EnrichedBatch {
    let mut memo: HashMap<String, MappingMatch> = HashMap::new();
    // key -> (first spelling seen, occurrences)
    let mut missed: BTreeMap<String, (String, usize)> = BTreeMap::new();

    let enriched: Vec<EnrichedSetRecord> = records
        .into_iter()
        .map(|record| {
            let key = normalize_exercise_key(&record.set.exercise_name);
            let hit = memo
                .entry(key.clone())
                .or_insert_with(|| mapping.lookup_key(&key))
                .clone();
            if hit.is_miss() {
                missed
                    .entry(key)
                    .or_insert_with(|| (record.set.exercise_name.clone(), 0))
                    .1 += 1;
            }
            EnrichedSetRecord::new(record, hit)
        })
        .collect();

    let mut misses: Vec<MappingMiss> = missed
        .into_values()
        .map(|(exercise, occurrences)| MappingMiss {
            exercise,
            occurrences,
        })
        .collect();
    misses.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| a.exercise.cmp(&b.exercise))
    });

    if !misses.is_empty() {
        tracing::warn!(
            distinct = misses.len(),
            "exercises without a muscle-group mapping default to other"
        );
    }
    observability::record_mapping_misses(misses.len());
    tracing::info!(
        rows = enriched.len(),
        distinct_exercises = memo.len(),
        version = %mapping.version(),
        "records enriched"
    );

    EnrichedBatch {
        records: enriched,
        misses,
        mapping_version: mapping.version().to_string(),
    }
}
