//! Region-driven actions: splitting, intruder fixing and deletion.

use log::{debug, warn};
use trackrec_core::{Cluster, Hit, Region, RegionType, TrackEvent};

use crate::action::{Action, ActionContext};
use crate::error::{PipelineError, Result};
use crate::options::ActionOptions;

/// Resolves region names against the pipeline configuration.
fn resolve_regions(action: &str, names: &[String], ctx: &ActionContext<'_>) -> Result<Vec<Region>> {
    names
        .iter()
        .map(|name| {
            ctx.region(name)
                .copied()
                .ok_or_else(|| PipelineError::UnknownRegion {
                    action: action.to_string(),
                    region: name.clone(),
                })
        })
        .collect()
}

fn parse_region_type(action: &str, key: &str, text: &str) -> Result<RegionType> {
    match text {
        "none" => Ok(RegionType::None),
        "beam" => Ok(RegionType::Beam),
        "not-beam" => Ok(RegionType::NotBeam),
        other => Err(PipelineError::InvalidOption {
            action: action.to_string(),
            key: key.to_string(),
            reason: format!("unknown region type '{other}'"),
        }),
    }
}

/// Partitions unclassified clusters by the configured regions.
///
/// A hit goes to the first region containing it, or to the default bucket.
/// Fragments smaller than `min_hits` are sent to noise. Each fragment takes
/// the region type of its bucket; beam fragments are flagged beam-like.
#[derive(Debug, Clone)]
pub struct SplitRegion {
    regions: Vec<Region>,
    default_kind: RegionType,
    min_hits: usize,
}

impl SplitRegion {
    /// Registry name.
    pub const NAME: &'static str = "split-region";

    fn bucket_of(&self, hit: &Hit) -> usize {
        self.regions
            .iter()
            .position(|r| r.contains(&hit.pos))
            .unwrap_or(self.regions.len())
    }

    fn kind_of(&self, bucket: usize) -> RegionType {
        self.regions.get(bucket).map_or(self.default_kind, |r| r.kind)
    }

    fn split(&self, mut cluster: Cluster, out: &mut Vec<Cluster>, noise: &mut Vec<Hit>) {
        let mut buckets: Vec<Vec<Hit>> = vec![Vec::new(); self.regions.len() + 1];
        for hit in &cluster.hits {
            buckets[self.bucket_of(hit)].push(*hit);
        }

        let occupied: Vec<usize> = (0..buckets.len())
            .filter(|&b| !buckets[b].is_empty())
            .collect();
        match occupied[..] {
            [bucket] if cluster.len() >= self.min_hits => {
                cluster.region = self.kind_of(bucket);
                cluster.beam_like |= cluster.region == RegionType::Beam;
                out.push(cluster);
                return;
            }
            _ => {}
        }

        debug!(
            "{}: cluster {} ({} hits) split over {} regions",
            Self::NAME,
            cluster.id,
            cluster.len(),
            occupied.len()
        );
        for (bucket, hits) in buckets.into_iter().enumerate() {
            if hits.is_empty() {
                continue;
            }
            if hits.len() < self.min_hits {
                noise.extend(hits);
                continue;
            }
            let mut fragment = Cluster::from_hits(out.len(), hits, cluster.fit_mode);
            fragment.region = self.kind_of(bucket);
            fragment.beam_like = fragment.region == RegionType::Beam;
            out.push(fragment);
        }
    }
}

impl Default for SplitRegion {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            default_kind: RegionType::NotBeam,
            min_hits: 3,
        }
    }
}

impl Action for SplitRegion {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        let names = reader.strings("regions")?;
        if names.is_empty() {
            return Err(PipelineError::InvalidOption {
                action: Self::NAME.to_string(),
                key: "regions".to_string(),
                reason: "at least one region is required".to_string(),
            });
        }
        self.regions = resolve_regions(Self::NAME, &names, ctx)?;
        if let Some(kind) = reader.strings("default")?.first() {
            self.default_kind = parse_region_type(Self::NAME, "default", kind)?;
        }
        self.min_hits = reader.usize_or("min_hits", self.min_hits)?;
        reader.finish();
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        let mut out = Vec::with_capacity(event.clusters.len());
        for cluster in std::mem::take(&mut event.clusters) {
            if cluster.region == RegionType::None {
                self.split(cluster, &mut out, &mut event.noise);
            } else {
                out.push(cluster);
            }
        }
        event.clusters = out;
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}: split over {} regions (default {:?}, min {} hits)",
            Self::NAME,
            self.regions.len(),
            self.default_kind,
            self.min_hits
        )
    }
}

/// Repairs a split that left one tiny cluster inside the beam region.
///
/// With exactly one such intruder and two clusters outside the beam, the
/// intruder joins the larger of the two. With more than two outside, the
/// intruder is deleted. Anything else is left alone.
///
/// `max_intruder_hits` defaults to the default `min_hits` of
/// [`SplitRegion`], the smallest fragment a split can leave behind. Keep the
/// two in step when either is configured.
#[derive(Debug, Clone)]
pub struct MergeFix {
    max_intruder_hits: usize,
}

impl MergeFix {
    /// Registry name.
    pub const NAME: &'static str = "merge-fix";

    fn is_intruder(&self, cluster: &Cluster) -> bool {
        cluster.region == RegionType::Beam && cluster.len() <= self.max_intruder_hits
    }
}

impl Default for MergeFix {
    fn default() -> Self {
        Self {
            max_intruder_hits: SplitRegion::default().min_hits,
        }
    }
}

impl Action for MergeFix {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        self.max_intruder_hits = reader.usize_or("max_intruder_hits", self.max_intruder_hits)?;
        reader.finish();
        if !ctx.has_action(SplitRegion::NAME) {
            warn!(
                "{}: no {} action in the pipeline; only pre-classified clusters are considered",
                Self::NAME,
                SplitRegion::NAME
            );
        }
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        let intruders: Vec<usize> = event
            .clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| self.is_intruder(c))
            .map(|(idx, _)| idx)
            .collect();
        let [intruder] = intruders[..] else {
            return Ok(());
        };
        let outside: Vec<usize> = event
            .clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.region == RegionType::NotBeam)
            .map(|(idx, _)| idx)
            .collect();

        match outside[..] {
            [a, b] => {
                let target = if event.clusters[b].len() > event.clusters[a].len() { b } else { a };
                let absorbed = event.clusters.remove(intruder);
                let target = if intruder < target { target - 1 } else { target };
                debug!(
                    "{}: merging intruder {} into cluster {}",
                    Self::NAME,
                    absorbed.id,
                    event.clusters[target].id
                );
                event.clusters[target].absorb(absorbed);
            }
            [_, _, _, ..] => {
                let removed = event.clusters.remove(intruder);
                debug!(
                    "{}: {} clusters outside the beam, deleting intruder {}",
                    Self::NAME,
                    outside.len(),
                    removed.id
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}: fix beam intruders with at most {} hits",
            Self::NAME,
            self.max_intruder_hits
        )
    }
}

/// Deletes clusters lying entirely inside the named regions.
#[derive(Debug, Clone, Default)]
pub struct DeleteRegion {
    regions: Vec<Region>,
}

impl DeleteRegion {
    /// Registry name.
    pub const NAME: &'static str = "delete-region";

    fn covered(&self, cluster: &Cluster) -> bool {
        !cluster.is_empty()
            && cluster
                .iter()
                .all(|h| self.regions.iter().any(|r| r.contains(&h.pos)))
    }
}

impl Action for DeleteRegion {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        let names = reader.strings("regions")?;
        self.regions = resolve_regions(Self::NAME, &names, ctx)?;
        reader.finish();
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        for cluster in &mut event.clusters {
            cluster.to_delete = self.covered(cluster);
        }
        let removed = event.purge_deleted();
        if removed > 0 {
            debug!("{}: deleted {removed} clusters", Self::NAME);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}: delete clusters inside {} regions",
            Self::NAME,
            self.regions.len()
        )
    }
}
