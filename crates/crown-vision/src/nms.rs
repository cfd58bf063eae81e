//! Score-weighted pairwise NMS over projected boxes.
//!
//! Every unordered pair (i, j), i < j, is compared once. When their IoU is
//! above the threshold the box with the lower score is marked; on an exact
//! score tie the later box (j) is marked. A box marked by any pair is dropped.
//! Marks never feed back into later comparisons, so the outcome does not
//! depend on the order pairs are visited in.

use crown_proto::ProjectedDetection;
use geo::{Area, Rect};
use rstar::{RTree, RTreeObject, AABB};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairStrategy {
    /// Plain O(n²) scan.
    AllPairs,
    /// R-tree lookup of boxes whose envelopes intersect. Only valid for a
    /// non-negative IoU threshold, where disjoint pairs can never be marked.
    Indexed,
}

pub fn intersection_area(a: &Rect<f64>, b: &Rect<f64>) -> f64 {
    let w = a.max().x.min(b.max().x) - a.min().x.max(b.min().x);
    let h = a.max().y.min(b.max().y) - a.min().y.max(b.min().y);
    w.max(0.0) * h.max(0.0)
}

pub fn iou(a: &Rect<f64>, b: &Rect<f64>) -> f64 {
    let inter = intersection_area(a, b);
    let union = a.unsigned_area() + b.unsigned_area() - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

pub fn perimeter(r: &Rect<f64>) -> f64 {
    2.0 * (r.width() + r.height())
}

/// (1-alpha)*area + alpha*perimeter: larger, more regular boxes win over
/// slivers cut at tile edges.
pub fn score(r: &Rect<f64>, alpha: f64) -> f64 {
    (1.0 - alpha) * r.unsigned_area() + alpha * perimeter(r)
}

/// Returns `true` for every box that loses at least one comparison.
pub fn suppression_marks(boxes: &[Rect<f64>], iou_th: f64, alpha: f64, strategy: PairStrategy) -> Vec<bool> {
    let scores: Vec<f64> = boxes.iter().map(|b| score(b, alpha)).collect();
    let mut marks = vec![false; boxes.len()];

    let mut judge = |i: usize, j: usize| {
        if iou(&boxes[i], &boxes[j]) > iou_th {
            if scores[i] >= scores[j] {
                marks[j] = true;
            } else {
                marks[i] = true;
            }
        }
    };

    match strategy {
        PairStrategy::AllPairs => {
            for i in 0..boxes.len() {
                for j in i + 1..boxes.len() {
                    judge(i, j);
                }
            }
        }
        PairStrategy::Indexed => {
            let tree = RTree::bulk_load(boxes.iter().enumerate().map(|(idx, b)| IndexedBox::new(idx, b)).collect());
            for (i, b) in boxes.iter().enumerate() {
                let env = IndexedBox::new(i, b).env;
                let mut partners: Vec<usize> = tree
                    .locate_in_envelope_intersecting(&env)
                    .map(|e| e.idx)
                    .filter(|&j| j > i)
                    .collect();
                partners.sort_unstable();
                for j in partners {
                    judge(i, j);
                }
            }
        }
    }
    marks
}

pub fn nms_with_score(dets: Vec<ProjectedDetection>, iou_th: f64, alpha: f64, strategy: PairStrategy) -> Vec<ProjectedDetection> {
    let boxes: Vec<Rect<f64>> = dets.iter().map(|d| d.bbox).collect();
    let marks = suppression_marks(&boxes, iou_th, alpha, strategy);
    dets.into_iter()
        .zip(marks)
        .filter_map(|(d, marked)| (!marked).then_some(d))
        .collect()
}

struct IndexedBox {
    idx: usize,
    env: AABB<[f64; 2]>,
}

impl IndexedBox {
    fn new(idx: usize, r: &Rect<f64>) -> Self {
        Self { idx, env: AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]) }
    }
}

impl RTreeObject for IndexedBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}
