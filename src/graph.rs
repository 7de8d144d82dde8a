//! Superpixel neighbourhood graphs.

use crate::arrays::Array2D;
use crate::aslic::{Segmentation, UNASSIGNED};
use crate::segment::SegmentData;
use crate::superpixel::Superpixel;
use assume::assume;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;

/// One node per superpixel, edges carry the linear indices of their border pixels.
pub type BorderGraph<T> = UnGraph<Superpixel<T>, Vec<usize>>;

/// One node per superpixel, edges carry a weight.
pub type SegmentGraph<T> = UnGraph<Superpixel<T>, f32>;

/// Borders between 4-adjacent pixels of different superpixels.
///
/// Every pixel except the last row and column is compared with its right and lower neighbour.
/// Both pixels of a border pair are recorded under the key `(min id, max id)`, the owner of
/// the scanned pixel first. Unassigned pixels have no borders.
pub fn find_borders(indices: &Array2D<i32>) -> BTreeMap<(usize, usize), Vec<usize>> {
    let mut borders: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    let width = indices.width;
    let mut record = |a: i32, b: i32, k0: usize, k1: usize| {
        let (a, b) = (a as usize, b as usize);
        let key = if a < b { (a, b) } else { (b, a) };
        let pixels = borders.entry(key).or_default();
        pixels.push(k0);
        pixels.push(k1);
    };
    for y in 0..indices.height.saturating_sub(1) {
        for x in 0..width.saturating_sub(1) {
            let k = y * width + x;
            assume!(unsafe: k + width < indices.len(), "pixel {k} has no lower neighbour");
            let i0 = indices.data[k];
            if i0 == UNASSIGNED {
                continue;
            }
            let i1 = indices.data[k + 1];
            if i1 != i0 && i1 != UNASSIGNED {
                record(i0, i1, k, k + 1);
            }
            let i2 = indices.data[k + width];
            if i2 != i0 && i2 != UNASSIGNED {
                record(i0, i2, k, k + width);
            }
        }
    }
    borders
}

/// Neighbourhood graph of a segmentation. Node `i` is superpixel `i`.
pub fn border_graph<T: SegmentData>(segmentation: &Segmentation<T>) -> BorderGraph<T> {
    let borders = find_borders(&segmentation.indices);
    let mut graph =
        BorderGraph::with_capacity(segmentation.superpixels.len(), borders.len());
    for sp in &segmentation.superpixels {
        graph.add_node(*sp);
    }
    for ((a, b), pixels) in borders {
        graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), pixels);
    }
    graph
}

/// Replace border pixels by `dist(a, b, border_pixels)`.
pub fn weighted_graph<T, F>(graph: &BorderGraph<T>, dist: F) -> SegmentGraph<T>
where
    T: SegmentData,
    F: Fn(&Superpixel<T>, &Superpixel<T>, &[usize]) -> f32,
{
    let mut weighted = SegmentGraph::with_capacity(graph.node_count(), graph.edge_count());
    for n in graph.node_indices() {
        weighted.add_node(graph[n]);
    }
    for edge in graph.edge_references() {
        let w = dist(&graph[edge.source()], &graph[edge.target()], edge.weight());
        weighted.add_edge(edge.source(), edge.target(), w);
    }
    weighted
}
