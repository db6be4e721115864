//! Duplicate clustering over per-image hash records.
//!
//! # Overview
//!
//! Every unordered pair of eligible images is compared under each enabled
//! criterion:
//!
//! - **Exact**: equal sampled fingerprints confirmed by equal full-content
//!   digests ("identical file"). A fingerprint alone never counts.
//! - **Hash**: for each enabled kind, the smallest distance over the enabled
//!   rotations is compared against that kind's threshold.
//! - **Scaled** (multi-scale mode only): a kind that misses its threshold is
//!   compared again across the rescaled copies of both images, against the
//!   threshold widened by [`HashKind::scale_slack`].
//!
//! A pair matches on hashes when at least `min_matching_kinds` kinds match
//! under the hash or scaled criterion.
//!
//! Matching pairs are merged with a union-find structure, so clusters are the
//! transitive closure of the match relation: when A matches B and B matches C,
//! all three share a group even if A and C alone would not match.
//!
//! Pure-color images and images without any usable code never take part.
//!
//! # Example
//!
//! ```
//! use pixeldupe::duplicates::{AnalysisParams, GroupingEngine, ImageRecord};
//! use pixeldupe::hashing::{HashCode, HashKind, HashValue, ImageCodes, Rotation};
//!
//! let mut codes = ImageCodes::new();
//! codes.insert(
//!     HashKind::Dhash,
//!     Rotation::Deg0,
//!     HashValue::Valid(HashCode::from_hex("ff00ff00ff00ff00", 64).unwrap()),
//! );
//!
//! let records = vec![
//!     ImageRecord::new(0, "a.png".into(), codes.clone()),
//!     ImageRecord::new(1, "b.png".into(), codes),
//! ];
//!
//! let params = AnalysisParams::default().with_kinds(vec![HashKind::Dhash]);
//! let groups = GroupingEngine::new(params).group(&records);
//!
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].reason, "dHash");
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::params::AnalysisParams;
use crate::hashing::{
    ContentDigest, DistanceEngine, Fingerprint, HashKind, HashValue, ImageCodes, Rotation,
};

/// Compact per-image data retained for grouping.
///
/// Pixel data is never stored here; only the derived codes.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Position of the image in the input order
    pub id: usize,
    /// Path of the image
    pub path: PathBuf,
    /// Hash values per kind and rotation
    pub codes: ImageCodes,
    /// Whether the image was classified as pure-color
    pub pure_color: bool,
    /// Cheap content fingerprint, if it could be computed
    pub fingerprint: Option<Fingerprint>,
    /// Full-content digest, present only when the fingerprint collided
    pub content_digest: Option<ContentDigest>,
    /// Codes of rescaled copies at 0°, keyed by scale percent
    pub scaled_codes: Vec<(u32, ImageCodes)>,
}

impl ImageRecord {
    /// Create a record with no pure-color flag and no fingerprint.
    #[must_use]
    pub fn new(id: usize, path: PathBuf, codes: ImageCodes) -> Self {
        Self {
            id,
            path,
            codes,
            pure_color: false,
            fingerprint: None,
            content_digest: None,
            scaled_codes: Vec::new(),
        }
    }

    /// Set the pure-color flag.
    #[must_use]
    pub fn with_pure_color(mut self, pure_color: bool) -> Self {
        self.pure_color = pure_color;
        self
    }

    /// Attach a file fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Attach the full-content digest.
    #[must_use]
    pub fn with_content_digest(mut self, digest: ContentDigest) -> Self {
        self.content_digest = Some(digest);
        self
    }

    /// Attach the codes of a copy rescaled to `percent` of the original size.
    #[must_use]
    pub fn with_scaled_codes(mut self, percent: u32, codes: ImageCodes) -> Self {
        self.scaled_codes.push((percent, codes));
        self
    }

    /// Whether both files are known to have identical bytes.
    fn is_identical_to(&self, other: &ImageRecord) -> bool {
        let same_bucket = matches!(
            (self.fingerprint, other.fingerprint),
            (Some(a), Some(b)) if a == b
        );
        same_bucket
            && matches!(
                (self.content_digest, other.content_digest),
                (Some(a), Some(b)) if a == b
            )
    }

    /// 0° values of `kind` at every available scale, original first.
    fn scale_variants(&self, kind: HashKind) -> impl Iterator<Item = (u32, &HashValue)> + '_ {
        self.codes
            .get(kind, Rotation::Deg0)
            .map(|v| (100, v))
            .into_iter()
            .chain(
                self.scaled_codes
                    .iter()
                    .filter_map(move |(percent, codes)| {
                        codes.get(kind, Rotation::Deg0).map(|v| (*percent, v))
                    }),
            )
    }

    fn has_valid_code(&self) -> bool {
        self.codes
            .kinds()
            .any(|k| self.codes.rotations(k).any(|(_, v)| v.code().is_some()))
    }
}

/// One measured distance between two images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistancePair {
    /// Id of the first image
    pub a: usize,
    /// Id of the second image
    pub b: usize,
    /// Hash kind compared
    pub kind: HashKind,
    /// Rotation of the rotated side that produced the distance
    pub rotation: Rotation,
    /// Bit-level Hamming distance
    pub distance: u32,
}

/// A criterion that caused two images to be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchCriterion {
    /// Byte-identical content (equal fingerprints and content digests).
    Exact,
    /// A hash kind within threshold at the given rotation.
    Hash {
        /// The hash kind
        kind: HashKind,
        /// Rotation at which the minimum distance was found
        rotation: Rotation,
    },
    /// A hash kind within the widened threshold across rescaled copies.
    Scaled {
        /// The hash kind
        kind: HashKind,
        /// Larger scale over smaller scale of the best pairing, in percent
        ratio: u32,
    },
}

impl fmt::Display for MatchCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "identical file"),
            Self::Hash {
                kind,
                rotation: Rotation::Deg0,
            } => write!(f, "{}", kind),
            Self::Hash { kind, rotation } => write!(f, "{}@{}", kind, rotation),
            Self::Scaled { kind, ratio } => write!(f, "{} scaled {}%", kind, ratio),
        }
    }
}

/// Member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Id of the image
    pub id: usize,
    /// Path of the image
    pub path: PathBuf,
    /// Whether this member is the group's reference image
    pub is_reference: bool,
    /// Measured distance to the reference per hash kind (empty for the reference)
    pub distances: BTreeMap<HashKind, u32>,
}

/// A cluster of two or more near-duplicate images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// 1-based group number in report order
    pub id: usize,
    /// Human-readable reason, criteria joined with `+`
    pub reason: String,
    /// Every criterion that merged at least one pair in this group
    pub criteria: Vec<MatchCriterion>,
    /// Members in input order; the first is the reference
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    /// Number of images in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Groups always hold at least two images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The reference member.
    #[must_use]
    pub fn reference(&self) -> Option<&GroupMember> {
        self.members.first()
    }

    /// Members other than the reference.
    pub fn duplicates(&self) -> impl Iterator<Item = &GroupMember> {
        self.members.iter().skip(1)
    }
}

/// Union-find over dense indices with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    /// Create `n` singleton sets.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Representative of the set containing `i`.
    pub fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets containing `a` and `b`. Returns false if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
        true
    }
}

/// A matching pair found during the pairwise pass.
#[derive(Debug, Clone)]
struct MatchEdge {
    left: usize,
    right: usize,
    criteria: Vec<MatchCriterion>,
}

/// Clusters image records into duplicate groups.
#[derive(Debug, Clone)]
pub struct GroupingEngine {
    params: AnalysisParams,
    engine: DistanceEngine,
}

impl GroupingEngine {
    /// Create a grouping engine for the given parameters.
    #[must_use]
    pub fn new(params: AnalysisParams) -> Self {
        let engine = DistanceEngine::new(params.hash_size);
        Self { params, engine }
    }

    /// The parameters used by this engine.
    #[must_use]
    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Smallest distance between `a` and `b` for `kind` over enabled rotations.
    ///
    /// Compares `a` at 0° against every rotation of `b` and `b` at 0° against
    /// every rotation of `a`. Ties keep the smaller angle. Returns `None` if no
    /// pair of values is comparable.
    #[must_use]
    pub fn best_distance(
        &self,
        kind: HashKind,
        a: &ImageRecord,
        b: &ImageRecord,
    ) -> Option<DistancePair> {
        let mut best: Option<DistancePair> = None;
        for rotation in self.params.rotations() {
            let candidates = [
                (a.codes.get(kind, Rotation::Deg0), b.codes.get(kind, rotation)),
                (b.codes.get(kind, Rotation::Deg0), a.codes.get(kind, rotation)),
            ];
            for (left, right) in candidates {
                let (Some(left), Some(right)) = (left, right) else {
                    continue;
                };
                match self.engine.distance(kind, left, right) {
                    Ok(distance) => {
                        if best.map_or(true, |p| distance < p.distance) {
                            best = Some(DistancePair {
                                a: a.id,
                                b: b.id,
                                kind,
                                rotation,
                                distance,
                            });
                        }
                    }
                    Err(e) => {
                        log::debug!(
                            "Skipping {} comparison of {} and {}: {}",
                            kind,
                            a.path.display(),
                            b.path.display(),
                            e
                        );
                    }
                }
            }
        }
        best
    }

    /// Smallest distance between any scale variant of `a` and any of `b`.
    ///
    /// Returns the distance with the scale ratio of the pairing that produced
    /// it. Ties keep the smaller ratio.
    #[must_use]
    pub fn best_scaled_distance(
        &self,
        kind: HashKind,
        a: &ImageRecord,
        b: &ImageRecord,
    ) -> Option<(u32, u32)> {
        let mut best: Option<(u32, u32)> = None;
        for (scale_a, left) in a.scale_variants(kind) {
            for (scale_b, right) in b.scale_variants(kind) {
                let Ok(distance) = self.engine.distance(kind, left, right) else {
                    continue;
                };
                let ratio = scale_a.max(scale_b) * 100 / scale_a.min(scale_b).max(1);
                if best.map_or(true, |current| (distance, ratio) < current) {
                    best = Some((distance, ratio));
                }
            }
        }
        best
    }

    /// Criteria under which two records match (empty when they do not).
    #[must_use]
    pub fn match_criteria(&self, a: &ImageRecord, b: &ImageRecord) -> Vec<MatchCriterion> {
        let mut criteria = Vec::new();

        if self.params.detect_exact && a.is_identical_to(b) {
            criteria.push(MatchCriterion::Exact);
        }

        let mut hash_matches = Vec::new();
        for kind in self.params.enabled_kinds() {
            let direct = self
                .best_distance(kind, a, b)
                .filter(|pair| pair.distance <= self.params.threshold(kind));
            if let Some(pair) = direct {
                hash_matches.push(MatchCriterion::Hash {
                    kind,
                    rotation: pair.rotation,
                });
            } else if self.params.multi_scale {
                let scaled = self
                    .best_scaled_distance(kind, a, b)
                    .filter(|&(distance, _)| distance <= self.params.scaled_threshold(kind));
                if let Some((_, ratio)) = scaled {
                    hash_matches.push(MatchCriterion::Scaled { kind, ratio });
                }
            }
        }

        if !hash_matches.is_empty() && hash_matches.len() >= self.params.min_matching_kinds {
            criteria.extend(hash_matches);
        }
        criteria
    }

    /// Cluster `records` into duplicate groups.
    ///
    /// Groups are ordered by their reference (the member earliest in input
    /// order), and members within a group follow input order.
    #[must_use]
    pub fn group(&self, records: &[ImageRecord]) -> Vec<DuplicateGroup> {
        let eligible: Vec<&ImageRecord> = records
            .iter()
            .filter(|r| !r.pure_color)
            .filter(|r| r.has_valid_code() || (self.params.detect_exact && r.fingerprint.is_some()))
            .collect();

        let n = eligible.len();
        if n < 2 {
            return Vec::new();
        }

        log::debug!("Comparing {} images pairwise", n);

        let pool: &[&ImageRecord] = &eligible;
        let edges: Vec<MatchEdge> = (0..n)
            .into_par_iter()
            .flat_map_iter(move |i| {
                (i + 1..n).filter_map(move |j| {
                    let criteria = self.match_criteria(pool[i], pool[j]);
                    if criteria.is_empty() {
                        None
                    } else {
                        Some(MatchEdge {
                            left: i,
                            right: j,
                            criteria,
                        })
                    }
                })
            })
            .collect();

        log::debug!("Found {} matching pairs", edges.len());

        let mut sets = DisjointSet::new(n);
        for edge in &edges {
            sets.union(edge.left, edge.right);
        }

        // Cluster membership and triggering criteria keyed by root
        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..n {
            clusters.entry(sets.find(i)).or_default().push(i);
        }
        let mut triggers: BTreeMap<usize, BTreeSet<MatchCriterion>> = BTreeMap::new();
        for edge in &edges {
            triggers
                .entry(sets.find(edge.left))
                .or_default()
                .extend(edge.criteria.iter().copied());
        }

        let mut ordered: Vec<(usize, Vec<usize>)> = clusters
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .collect();
        ordered.sort_by_key(|(_, members)| members[0]);

        ordered
            .into_iter()
            .enumerate()
            .map(|(index, (root, members))| {
                let criteria: Vec<MatchCriterion> =
                    triggers.remove(&root).unwrap_or_default().into_iter().collect();
                self.build_group(index + 1, &members, criteria, &eligible)
            })
            .collect()
    }

    fn build_group(
        &self,
        id: usize,
        members: &[usize],
        criteria: Vec<MatchCriterion>,
        eligible: &[&ImageRecord],
    ) -> DuplicateGroup {
        let reason = criteria
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("+");

        let reference = eligible[members[0]];
        let members = members
            .iter()
            .enumerate()
            .map(|(pos, &idx)| {
                let record = eligible[idx];
                let distances = if pos == 0 {
                    BTreeMap::new()
                } else {
                    self.params
                        .enabled_kinds()
                        .into_iter()
                        .filter_map(|kind| {
                            self.best_distance(kind, reference, record)
                                .map(|pair| (kind, pair.distance))
                        })
                        .collect()
                };
                GroupMember {
                    id: record.id,
                    path: record.path.clone(),
                    is_reference: pos == 0,
                    distances,
                }
            })
            .collect();

        DuplicateGroup {
            id,
            reason,
            criteria,
            members,
        }
    }
}

/// Whether any value in `codes` is the pure-color marker at 0°.
#[must_use]
pub fn has_pure_color_code(codes: &ImageCodes) -> bool {
    codes
        .get(HashKind::Ahash, Rotation::Deg0)
        .is_some_and(HashValue::is_pure_color)
}
