//! Density clustering of active issue locations
//!
//! DBSCAN over raw `(lat, lng)` degrees with Euclidean distance. A point is a
//! core point when at least `min_samples` points (itself included) lie within
//! `eps`. Border points join the first cluster that reaches them; noise is
//! dropped.

use crate::db::analytics::ActivePoint;
use serde::Serialize;

/// Neighbourhood radius in degrees (~200 m)
pub const DEFAULT_EPS: f64 = 0.002;

/// Neighbours (self included) needed for a core point
pub const DEFAULT_MIN_SAMPLES: usize = 3;

/// Below this many points no clustering is attempted
pub const MIN_POINTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Center {
    pub lat: f64,
    pub lng: f64,
}

/// One dense cluster of active issues
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    /// Member locations as `[lat, lng]` pairs, in input order
    pub points: Vec<[f64; 2]>,
    pub avg_severity: f64,
    pub center: Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Cluster(usize),
}

/// Cluster points, returning hotspots ordered by their first member
pub fn find_hotspots(points: &[ActivePoint], eps: f64, min_samples: usize) -> Vec<Hotspot> {
    if points.len() < MIN_POINTS {
        return Vec::new();
    }

    let labels = dbscan(points, eps, min_samples);

    let cluster_count = labels
        .iter()
        .filter_map(|label| match label {
            Label::Cluster(c) => Some(*c + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0);

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); cluster_count];
    for (idx, label) in labels.iter().enumerate() {
        if let Label::Cluster(c) = label {
            members[*c].push(idx);
        }
    }

    // Cluster ids follow core discovery; report by first member instead
    members.sort_by_key(|m| m.first().copied().unwrap_or(usize::MAX));

    members
        .into_iter()
        .filter(|m| !m.is_empty())
        .map(|m| summarize(points, &m))
        .collect()
}

fn summarize(points: &[ActivePoint], members: &[usize]) -> Hotspot {
    let n = members.len() as f64;
    let (mut lat_sum, mut lng_sum, mut severity_sum) = (0.0_f64, 0.0_f64, 0.0_f64);

    let coords: Vec<[f64; 2]> = members
        .iter()
        .map(|&i| {
            let p = &points[i];
            lat_sum += p.lat;
            lng_sum += p.lng;
            severity_sum += p.severity as f64;
            [p.lat, p.lng]
        })
        .collect();

    Hotspot {
        points: coords,
        avg_severity: severity_sum / n,
        center: Center {
            lat: lat_sum / n,
            lng: lng_sum / n,
        },
    }
}

fn dbscan(points: &[ActivePoint], eps: f64, min_samples: usize) -> Vec<Label> {
    let mut labels = vec![Label::Unvisited; points.len()];
    let mut next_cluster = 0;

    for idx in 0..points.len() {
        if labels[idx] != Label::Unvisited {
            continue;
        }

        let neighbours = region_query(points, idx, eps);
        if neighbours.len() < min_samples {
            labels[idx] = Label::Noise;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[idx] = Label::Cluster(cluster);

        let mut queue = neighbours;
        let mut cursor = 0;
        while cursor < queue.len() {
            let q = queue[cursor];
            cursor += 1;

            match labels[q] {
                Label::Noise => labels[q] = Label::Cluster(cluster),
                Label::Unvisited => {
                    labels[q] = Label::Cluster(cluster);
                    let expansion = region_query(points, q, eps);
                    if expansion.len() >= min_samples {
                        queue.extend(expansion);
                    }
                }
                Label::Cluster(_) => {}
            }
        }
    }

    labels
}

fn region_query(points: &[ActivePoint], idx: usize, eps: f64) -> Vec<usize> {
    let origin = &points[idx];
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let d_lat = p.lat - origin.lat;
            let d_lng = p.lng - origin.lng;
            (d_lat * d_lat + d_lng * d_lng).sqrt() <= eps
        })
        .map(|(i, _)| i)
        .collect()
}
