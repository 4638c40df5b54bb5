use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use super::directory::{GroupDirectory, LocalDirectory, LookupError};
use super::domain::{Pattern, ProductTagBaseline};

/// Unvalidated pattern fields as submitted by an integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDraft {
    pub local: String,
    pub name: String,
    pub base_vpc: f64,
    pub base_standard_deviation: f64,
    pub base_data_quality: f64,
    pub deficient_vpc: f64,
    pub optimum_vpc: f64,
    pub products_tags: Vec<ProductTagBaseline>,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("group reference must not be blank")]
    BlankGroup,
    #[error("local reference must not be blank")]
    BlankLocal,
    #[error("pattern name must not be blank")]
    BlankName,
    #[error("local {local} does not belong to group {group}")]
    LocalGroupMismatch { group: String, local: String },
    #[error("{field} must be a positive number")]
    NonPositive { field: &'static str },
    #[error("product tag name must not be blank")]
    BlankTagName,
    #[error("base presence of tag {tag:?} must lie in [0, 1]")]
    PresenceOutOfRange { tag: String },
    #[error("base ratio of tag {tag:?} must be a positive number")]
    NonPositiveRatio { tag: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("pattern already exists")]
    Conflict,
    #[error("no matching pattern found")]
    NotFound,
    #[error("no pattern in group {group} carries product tag {tag_name:?}")]
    TagNotFound { group: String, tag_name: String },
    #[error("pattern store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// One entry of an atomic multi-document update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternUpdate {
    pub uuid: String,
    pub set: PatternFieldSet,
}

/// Patchable pattern fields. Everything else is immutable after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternFieldSet {
    pub products_tags: Option<Vec<ProductTagBaseline>>,
    pub reference_date: Option<NaiveDate>,
}

/// Storage abstraction so the catalog and report pipeline can be exercised in
/// isolation. `bulk_update` must apply every entry as one atomic write.
pub trait PatternStore: Send + Sync {
    fn insert(&self, pattern: Pattern) -> Result<Pattern, StoreError>;
    fn remove(&self, uuid: &str) -> Result<(), StoreError>;
    fn find_by_keys(
        &self,
        group: &str,
        local: &str,
        name: &str,
    ) -> Result<Option<Pattern>, StoreError>;
    fn for_local(&self, group: &str, local: &str) -> Result<Vec<Pattern>, StoreError>;
    fn for_group(&self, group: &str) -> Result<Vec<Pattern>, StoreError>;
    fn bulk_update(&self, updates: &[PatternUpdate]) -> Result<usize, StoreError>;
}

impl Pattern {
    /// Stable creation key derived from the identity triple, so re-creating a
    /// pattern with the same keys yields the same uuid.
    pub fn derive_uuid(group: &str, local: &str, name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(group.as_bytes());
        hasher.update(local.as_bytes());
        hasher.update(name.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn require_positive(value: f64, field: &'static str) -> Result<(), ValidationError> {
    if value <= 0.0 {
        return Err(ValidationError::NonPositive { field });
    }
    Ok(())
}

/// Validate a draft against the profile invariants and produce the stored
/// record: stripped string fields, positive numerics, tag baselines in range,
/// and a local that belongs to the claimed group.
pub fn validate_draft(
    group: &str,
    reference_date: NaiveDate,
    draft: &PatternDraft,
    groups: &dyn GroupDirectory,
) -> Result<Pattern, StoreError> {
    let group = group.trim();
    if group.is_empty() {
        return Err(ValidationError::BlankGroup.into());
    }

    let local = draft.local.trim();
    if local.is_empty() {
        return Err(ValidationError::BlankLocal.into());
    }
    let owner = groups
        .for_local(local)?
        .ok_or_else(|| ValidationError::LocalGroupMismatch {
            group: group.to_string(),
            local: local.to_string(),
        })?;
    if owner.group_id != group {
        return Err(ValidationError::LocalGroupMismatch {
            group: group.to_string(),
            local: local.to_string(),
        }
        .into());
    }

    let name = draft.name.trim();
    if name.is_empty() {
        return Err(ValidationError::BlankName.into());
    }

    require_positive(draft.base_vpc, "base_vpc")?;
    require_positive(draft.base_standard_deviation, "base_standard_deviation")?;
    require_positive(draft.deficient_vpc, "deficient_vpc")?;
    require_positive(draft.optimum_vpc, "optimum_vpc")?;

    let mut products_tags = Vec::with_capacity(draft.products_tags.len());
    for tag in &draft.products_tags {
        let tag_name = tag.name.trim();
        if tag_name.is_empty() {
            return Err(ValidationError::BlankTagName.into());
        }
        if !(0.0..=1.0).contains(&tag.base_presence) {
            return Err(ValidationError::PresenceOutOfRange {
                tag: tag_name.to_string(),
            }
            .into());
        }
        if tag.base_ratio <= 0.0 {
            return Err(ValidationError::NonPositiveRatio {
                tag: tag_name.to_string(),
            }
            .into());
        }
        products_tags.push(ProductTagBaseline {
            name: tag_name.to_string(),
            image: tag.image.trim().to_string(),
            base_presence: tag.base_presence,
            base_ratio: tag.base_ratio,
        });
    }

    Ok(Pattern {
        uuid: Pattern::derive_uuid(group, local, name),
        group: group.to_string(),
        local: local.to_string(),
        name: name.to_string(),
        reference_date,
        base_vpc: draft.base_vpc,
        base_standard_deviation: draft.base_standard_deviation,
        base_data_quality: draft.base_data_quality,
        deficient_vpc: draft.deficient_vpc,
        optimum_vpc: draft.optimum_vpc,
        products_tags,
    })
}

/// Outcome of a batch creation: accepted and rejected pattern names grouped
/// by venue display name.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub accepted: BTreeMap<String, Vec<String>>,
    pub rejected: BTreeMap<String, Vec<RejectedPattern>>,
}

#[derive(Debug, Serialize)]
pub struct RejectedPattern {
    pub name: String,
    pub reason: String,
}

/// Lifecycle service over the pattern store: validated creation with
/// replace-on-recreate, and the batched patch paths.
pub struct PatternCatalog<S> {
    store: Arc<S>,
    groups: Arc<dyn GroupDirectory>,
    locals: Arc<dyn LocalDirectory>,
}

impl<S> PatternCatalog<S>
where
    S: PatternStore + 'static,
{
    pub fn new(store: Arc<S>, groups: Arc<dyn GroupDirectory>, locals: Arc<dyn LocalDirectory>) -> Self {
        Self {
            store,
            groups,
            locals,
        }
    }

    /// Validate and store one draft, replacing any pattern with the same
    /// (group, local, name) keys.
    pub fn create(
        &self,
        group: &str,
        reference_date: NaiveDate,
        draft: &PatternDraft,
    ) -> Result<Pattern, StoreError> {
        let pattern = validate_draft(group, reference_date, draft, self.groups.as_ref())?;
        if let Some(existing) =
            self.store
                .find_by_keys(&pattern.group, &pattern.local, &pattern.name)?
        {
            self.store.remove(&existing.uuid)?;
        }
        self.store.insert(pattern)
    }

    /// Store a batch of drafts for a group, partitioning the outcome into
    /// accepted and rejected names per venue. Rejections never abort the
    /// batch.
    pub fn create_batch(
        &self,
        group: &str,
        reference_date: NaiveDate,
        drafts: &[PatternDraft],
    ) -> Result<BatchOutcome, StoreError> {
        let mut outcome = BatchOutcome::default();
        for draft in drafts {
            let venue = self.venue_label(&draft.local);
            match self.create(group, reference_date, draft) {
                Ok(pattern) => {
                    outcome.accepted.entry(venue).or_default().push(pattern.name);
                }
                Err(StoreError::Validation(reason)) => {
                    outcome.rejected.entry(venue).or_default().push(RejectedPattern {
                        name: draft.name.trim().to_string(),
                        reason: reason.to_string(),
                    });
                }
                Err(other) => return Err(other),
            }
        }
        info!(
            group,
            accepted = outcome.accepted.values().map(Vec::len).sum::<usize>(),
            rejected = outcome.rejected.values().map(Vec::len).sum::<usize>(),
            "pattern batch stored"
        );
        Ok(outcome)
    }

    /// Backfill the image url of one product tag across every pattern of the
    /// group that carries it, as a single atomic batch update. Returns the
    /// number of patched patterns.
    pub fn load_tag_image(
        &self,
        group: &str,
        tag_name: &str,
        image: &str,
    ) -> Result<usize, StoreError> {
        let mut updates = Vec::new();
        for pattern in self.store.for_group(group)? {
            if !pattern.products_tags.iter().any(|tag| tag.name == tag_name) {
                continue;
            }
            let products_tags = pattern
                .products_tags
                .into_iter()
                .map(|mut tag| {
                    if tag.name == tag_name {
                        tag.image = image.to_string();
                    }
                    tag
                })
                .collect();
            updates.push(PatternUpdate {
                uuid: pattern.uuid,
                set: PatternFieldSet {
                    products_tags: Some(products_tags),
                    reference_date: None,
                },
            });
        }
        if updates.is_empty() {
            return Err(StoreError::TagNotFound {
                group: group.to_string(),
                tag_name: tag_name.to_string(),
            });
        }
        self.store.bulk_update(&updates)
    }

    /// Rewrite the reference date of every pattern of a group, optionally
    /// narrowed to one venue, as a single atomic batch update.
    pub fn update_reference_date(
        &self,
        group: &str,
        local: Option<&str>,
        reference_date: NaiveDate,
    ) -> Result<usize, StoreError> {
        let patterns = match local {
            Some(local) => self.store.for_local(group, local)?,
            None => self.store.for_group(group)?,
        };
        if patterns.is_empty() {
            return Err(StoreError::NotFound);
        }
        let updates: Vec<PatternUpdate> = patterns
            .into_iter()
            .map(|pattern| PatternUpdate {
                uuid: pattern.uuid,
                set: PatternFieldSet {
                    products_tags: None,
                    reference_date: Some(reference_date),
                },
            })
            .collect();
        self.store.bulk_update(&updates)
    }

    fn venue_label(&self, local_id: &str) -> String {
        match self.locals.info(local_id.trim()) {
            Ok(Some(info)) => info.name,
            _ => local_id.trim().to_string(),
        }
    }
}
