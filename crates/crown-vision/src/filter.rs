use crown_proto::ProjectedDetection;
use geo::Rect;
use tracing::debug;

pub fn aspect_ratio(r: &Rect<f64>) -> f64 {
    r.height() / r.width()
}

/// Keeps boxes with `min <= height/width <= max`, bounds inclusive.
/// Extreme ratios usually come from objects cut by a tile edge.
pub fn filter_aspect(dets: Vec<ProjectedDetection>, min: f64, max: f64) -> Vec<ProjectedDetection> {
    dets.into_iter()
        .filter(|d| {
            let ar = aspect_ratio(&d.bbox);
            let keep = (min..=max).contains(&ar);
            if !keep {
                debug!("filter: drop {} class={} aspect={:.3}", d.raw.filename, d.raw.class_id, ar);
            }
            keep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::det;

    #[test]
    fn bounds_are_inclusive() {
        let dets = vec![
            det("wide_edge", 0.0, 0.0, 4.0, 2.0),   // 0.5
            det("tall_edge", 0.0, 0.0, 2.0, 4.0),   // 2.0
            det("too_wide", 0.0, 0.0, 4.0, 1.99),   // 0.4975
            det("too_tall", 0.0, 0.0, 2.0, 4.01),   // 2.005
            det("square", 0.0, 0.0, 3.0, 3.0),
        ];
        let kept: Vec<String> = filter_aspect(dets, 0.5, 2.0).into_iter().map(|d| d.raw.filename).collect();
        assert_eq!(kept, vec!["wide_edge", "tall_edge", "square"]);
    }
}
