//! Fragment grouping: bucket curves by the pair of fields they separate, then merge each
//! bucket into maximal continuous curves.

use fieldstitch_core::StitchConfig;
use fieldstitch_geometry::Domain;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::curve::BoundaryCurve;

/// Stable index of a curve inside a [`CurveSet`].
pub type CurveId = usize;

type PairKey = (Option<String>, Option<String>);

fn pair_key(curve: &BoundaryCurve) -> PairKey {
    let a = curve.left().map(str::to_owned);
    let b = curve.right().map(str::to_owned);
    if a <= b { (a, b) } else { (b, a) }
}

/// Merged curves of one diagram, addressed by [`CurveId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveSet {
    curves: Vec<BoundaryCurve>,
}

impl CurveSet {
    /// Group `fragments` by unordered label pair and merge each group to a fixed point.
    ///
    /// Groups come out in label order (`None` first), so the result does not depend on the
    /// order fragments of different groups arrived in.
    #[must_use]
    pub fn group(fragments: impl IntoIterator<Item = BoundaryCurve>, cfg: &StitchConfig) -> Self {
        let mut groups: IndexMap<PairKey, Vec<BoundaryCurve>> = IndexMap::new();
        for curve in fragments {
            groups.entry(pair_key(&curve)).or_default().push(curve);
        }
        groups.sort_keys();

        let mut curves = Vec::new();
        for (key, mut group) in groups {
            let before = group.len();
            orient_like_first(&mut group);
            merge_to_fixed_point(&mut group, cfg);
            debug!(
                left = ?key.0,
                right = ?key.1,
                fragments = before,
                curves = group.len(),
                "grouped fragments"
            );
            curves.extend(group);
        }
        Self { curves }
    }

    #[must_use]
    pub fn from_curves(curves: Vec<BoundaryCurve>) -> Self {
        Self { curves }
    }

    #[must_use]
    pub fn curves(&self) -> &[BoundaryCurve] {
        &self.curves
    }

    #[must_use]
    pub fn into_curves(self) -> Vec<BoundaryCurve> {
        self.curves
    }

    #[must_use]
    pub fn get(&self, id: CurveId) -> Option<&BoundaryCurve> {
        self.curves.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Recompute border hits for every curve. Done once, after merging.
    pub fn compute_border_hits(&mut self, domain: &Domain, cfg: &StitchConfig) {
        for curve in &mut self.curves {
            curve.find_border_hits(domain, cfg);
        }
    }

    /// Curves separating `left` from `right`, in either orientation. `None` matches any label.
    pub fn select<'a>(
        &'a self,
        left: Option<&'a str>,
        right: Option<&'a str>,
    ) -> impl Iterator<Item = (CurveId, &'a BoundaryCurve)> + 'a {
        let side = |want: Option<&str>, have: Option<&str>| want.map_or(true, |w| have == Some(w));
        self.curves.iter().enumerate().filter(move |(_, c)| {
            (side(left, c.left()) && side(right, c.right()))
                || (side(left, c.right()) && side(right, c.left()))
        })
    }

    /// Ids of every curve with `label` on either side, in set order.
    #[must_use]
    pub fn bounding(&self, label: &str) -> Vec<CurveId> {
        self.curves
            .iter()
            .enumerate()
            .filter(|(_, c)| c.bounds(label))
            .map(|(id, _)| id)
            .collect()
    }

    /// Every field label present, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .curves
            .iter()
            .flat_map(|c| [c.left(), c.right()])
            .flatten()
            .map(str::to_owned)
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

/// Reverse curves whose labels are the mirror of the group's first curve.
fn orient_like_first(group: &mut [BoundaryCurve]) {
    let Some((first, rest)) = group.split_first_mut() else {
        return;
    };
    for curve in rest {
        if curve.left() != first.left() && curve.left() == first.right() {
            curve.reverse();
        }
    }
}

fn merge_to_fixed_point(group: &mut Vec<BoundaryCurve>, cfg: &StitchConfig) {
    loop {
        let mut merged_any = false;
        let mut j = 0;
        while j < group.len() {
            let mut k = j + 1;
            while k < group.len() {
                let (head, tail) = group.split_at_mut(k);
                if let Some(join) = head[j].merge(&tail[0], cfg) {
                    trace!(?join, into = j, from = k, "merged fragments");
                    group.remove(k);
                    merged_any = true;
                } else {
                    k += 1;
                }
            }
            j += 1;
        }
        if !merged_any {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldstitch_core::Coord;

    fn cfg() -> StitchConfig {
        StitchConfig {
            t_thresh: 0.5,
            p_thresh: 0.5,
            ..StitchConfig::default()
        }
    }

    fn frag(raw: &[(f64, f64)], left: Option<&str>, right: Option<&str>) -> BoundaryCurve {
        BoundaryCurve::with_points(
            raw.iter().copied().map(Coord::from),
            left.map(str::to_owned),
            right.map(str::to_owned),
        )
    }

    #[test]
    fn chains_out_of_order_fragments_into_one_curve() {
        let set = CurveSet::group(
            vec![
                frag(&[(2.0, 0.0), (3.0, 0.0)], Some("a"), Some("b")),
                frag(&[(0.0, 0.0), (1.0, 0.0)], Some("a"), Some("b")),
                frag(&[(1.0, 0.0), (2.0, 0.0)], Some("a"), Some("b")),
            ],
            &cfg(),
        );
        assert_eq!(set.len(), 1);
        let xs: Vec<f64> = set.curves()[0].points().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn mirrored_labels_share_a_group_and_are_reoriented() {
        let set = CurveSet::group(
            vec![
                frag(&[(0.0, 0.0), (1.0, 0.0)], Some("a"), Some("b")),
                frag(&[(2.0, 0.0), (1.0, 0.0)], Some("b"), Some("a")),
            ],
            &cfg(),
        );
        assert_eq!(set.len(), 1);
        let c = &set.curves()[0];
        assert_eq!(c.left(), Some("a"));
        assert_eq!(c.points().last(), Some(&Coord::new(2.0, 0.0)));
    }

    #[test]
    fn distant_fragments_stay_separate() {
        let set = CurveSet::group(
            vec![
                frag(&[(0.0, 0.0), (1.0, 0.0)], Some("a"), Some("b")),
                frag(&[(5.0, 0.0), (6.0, 0.0)], Some("a"), Some("b")),
            ],
            &cfg(),
        );
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn groups_are_sorted_by_label_pair() {
        let set = CurveSet::group(
            vec![
                frag(&[(0.0, 0.0), (1.0, 0.0)], Some("z"), Some("y")),
                frag(&[(0.0, 5.0), (1.0, 5.0)], Some("iso"), None),
                frag(&[(0.0, 9.0), (1.0, 9.0)], Some("a"), Some("b")),
            ],
            &cfg(),
        );
        let lefts: Vec<_> = set.curves().iter().map(|c| c.left()).collect();
        assert_eq!(lefts, vec![Some("iso"), Some("a"), Some("z")]);
        assert_eq!(set.labels(), vec!["a", "b", "iso", "y", "z"]);
    }

    #[test]
    fn select_matches_either_orientation_and_wildcards() {
        let set = CurveSet::from_curves(vec![
            frag(&[(0.0, 0.0)], Some("a"), Some("b")),
            frag(&[(1.0, 0.0)], Some("c"), Some("a")),
            frag(&[(2.0, 0.0)], Some("iso"), None),
        ]);
        let ids = |l, r| set.select(l, r).map(|(id, _)| id).collect::<Vec<_>>();
        assert_eq!(ids(Some("b"), Some("a")), vec![0]);
        assert_eq!(ids(Some("a"), None), vec![0, 1]);
        assert_eq!(ids(None, None), vec![0, 1, 2]);
        assert_eq!(set.bounding("a"), vec![0, 1]);
    }
}
