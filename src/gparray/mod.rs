//! Cluster topology.
//!
//! ## Overview
//! A `GpArray` is the validated view of one snapshot of `gp_segment_configuration`. It is built
//! once from the flat list of catalog rows and is read-only afterwards. Any role change in the
//! cluster (failover, recovery, added mirrors) is observed by rebuilding from a fresh snapshot.
//!
//! ## Pairing
//! Query executor segments are grouped by content id. Every content id must carry the same
//! number of segments: either all of them are singletons (a cluster without mirrors), in which
//! case the single segment must be acting as primary, or all of them are pairs, in which case
//! one segment must be acting as primary and the other as mirror.
//!
//! The order of `segment_pairs` is derived from an unordered grouping and is NOT stable across
//! rebuilds. Callers must look pairs up by content id.


use std::collections::{BTreeSet, HashMap};

use crate::error::TopologyError;
use crate::segment::{Role, Segment};

/// The copies of a single data partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentPair {
    /// The segment currently acting as primary.
    pub primary: Segment,
    /// The segment currently acting as mirror, absent when the cluster runs without mirrors.
    pub mirror: Option<Segment>,
}

impl SegmentPair {
    /// The content id of this partition.
    pub fn content(&self) -> i32 {
        self.primary.content
    }
}

/// The access file entries a primary needs so that its mirror may replicate from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HbaTarget {
    /// The data directory of the primary whose `pg_hba.conf` is to be updated.
    pub data_directory: String,
    /// The addresses to grant access to: the primary's own address followed by the mirror's.
    pub addresses: Vec<String>,
}

/// The validated whole-cluster view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GpArray {
    coordinator: Option<Segment>,
    standby: Option<Segment>,
    segment_pairs: Vec<SegmentPair>,
}

impl GpArray {
    /// Build a validated topology from the given segment rows.
    ///
    /// Row order is irrelevant.
    pub fn new(segments: impl IntoIterator<Item = Segment>) -> Result<Self, TopologyError> {
        let (mut coordinator, mut standby) = (None, None);
        let mut by_content: HashMap<i32, Vec<Segment>> = HashMap::new();
        // Unknown role codes never make it this far, see `Role::from_code`.
        for seg in segments {
            match (seg.is_query_dispatcher(), seg.role) {
                (true, Role::Primary) => {
                    if coordinator.is_some() {
                        return Err(TopologyError::DuplicateCoordinator { dbid: seg.dbid });
                    }
                    coordinator = Some(seg);
                }
                (true, Role::Mirror) => {
                    if standby.is_some() {
                        return Err(TopologyError::DuplicateStandby { dbid: seg.dbid });
                    }
                    standby = Some(seg);
                }
                (false, _) => by_content.entry(seg.content).or_default().push(seg),
            }
        }

        // Every content must carry as many segments as the first one encountered.
        let segs_per_content = match by_content.values().next() {
            Some(segs) => segs.len(),
            None => return Err(TopologyError::NoSegmentsFound),
        };
        if let Some((content, segs)) = by_content.iter().find(|(_, segs)| segs.len() != segs_per_content) {
            return Err(TopologyError::InconsistentPartitionSize {
                content: *content,
                expected: segs_per_content,
                found: segs.len(),
            });
        }

        let mut segment_pairs = Vec::with_capacity(by_content.len());
        for (content, segs) in by_content {
            let pair = match segs_per_content {
                1 => Self::single_pair(content, segs)?,
                2 => Self::mirrored_pair(content, segs)?,
                found => return Err(TopologyError::TooManySegmentsPerContent { content, found }),
            };
            segment_pairs.push(pair);
        }

        Ok(Self { coordinator, standby, segment_pairs })
    }

    /// Build the pair of a content id which runs without a mirror.
    fn single_pair(content: i32, segs: Vec<Segment>) -> Result<SegmentPair, TopologyError> {
        match segs.into_iter().next() {
            Some(primary) if primary.is_acting_primary() => Ok(SegmentPair { primary, mirror: None }),
            _ => Err(TopologyError::NoPrimaryForContent { content }),
        }
    }

    /// Build the pair of a mirrored content id, placing the primary first whatever the row order.
    fn mirrored_pair(content: i32, segs: Vec<Segment>) -> Result<SegmentPair, TopologyError> {
        let mut segs = segs.into_iter();
        match (segs.next(), segs.next()) {
            (Some(a), Some(b)) if a.is_acting_primary() && b.is_acting_mirror() => Ok(SegmentPair { primary: a, mirror: Some(b) }),
            (Some(a), Some(b)) if a.is_acting_mirror() && b.is_acting_primary() => Ok(SegmentPair { primary: b, mirror: Some(a) }),
            _ => Err(TopologyError::InvalidPairForContent { content }),
        }
    }

    /// The acting coordinator, if any.
    pub fn coordinator(&self) -> Option<&Segment> {
        self.coordinator.as_ref()
    }

    /// The acting standby coordinator, if any.
    pub fn standby(&self) -> Option<&Segment> {
        self.standby.as_ref()
    }

    /// All segment pairs, in no particular order.
    pub fn segment_pairs(&self) -> &[SegmentPair] {
        &self.segment_pairs
    }

    /// The primary of every pair, in pair order.
    pub fn primary_segments(&self) -> Vec<&Segment> {
        self.segment_pairs.iter().map(|pair| &pair.primary).collect()
    }

    /// The mirror of every pair which has one, in pair order.
    pub fn mirror_segments(&self) -> Vec<&Segment> {
        self.segment_pairs.iter().filter_map(|pair| pair.mirror.as_ref()).collect()
    }

    /// All primaries followed by all mirrors.
    pub fn all_segments(&self) -> Vec<&Segment> {
        let mut segs = self.primary_segments();
        segs.extend(self.mirror_segments());
        segs
    }

    /// Look up the pair holding the given content id.
    pub fn segment_pair_for_content(&self, content: i32) -> Result<&SegmentPair, TopologyError> {
        self.segment_pairs
            .iter()
            .find(|pair| pair.primary.content == content)
            .ok_or(TopologyError::ContentNotFound { content })
    }

    /// Does any partition of this cluster have a mirror.
    pub fn has_mirrors(&self) -> bool {
        self.segment_pairs.iter().any(|pair| pair.mirror.is_some())
    }

    /// Group all primaries and mirrors by hostname.
    pub fn segments_by_host(&self) -> HashMap<&str, Vec<&Segment>> {
        let mut hosts: HashMap<&str, Vec<&Segment>> = HashMap::new();
        for seg in self.all_segments() {
            hosts.entry(seg.hostname.as_str()).or_default().push(seg);
        }
        hosts
    }

    /// The sorted, unique hostnames of every instance of the cluster, coordinator and standby included.
    pub fn hostnames(&self) -> BTreeSet<&str> {
        self.coordinator
            .iter()
            .chain(self.standby.iter())
            .chain(self.all_segments())
            .map(|seg| seg.hostname.as_str())
            .collect()
    }

    /// For the given content ids, group the access file entries the primaries need for their
    /// mirrors by primary hostname.
    ///
    /// Contents without a mirror are skipped. An unknown content id is an error.
    pub fn mirror_hba_targets(&self, contents: &[i32]) -> Result<HashMap<&str, Vec<HbaTarget>>, TopologyError> {
        let mut hosts: HashMap<&str, Vec<HbaTarget>> = HashMap::new();
        for content in contents {
            let pair = self.segment_pair_for_content(*content)?;
            let mirror = match pair.mirror.as_ref() {
                Some(mirror) => mirror,
                None => continue,
            };
            hosts.entry(pair.primary.hostname.as_str()).or_default().push(HbaTarget {
                data_directory: pair.primary.data_directory.clone(),
                addresses: vec![pair.primary.address.clone(), mirror.address.clone()],
            });
        }
        Ok(hosts)
    }
}
