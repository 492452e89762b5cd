// Copyright 2017 Matthew Plant. This file is part of iris-collision.
//
// iris-collision is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// iris-collision is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with iris-collision. If not, see <http://www.gnu.org/licenses/>.

//! Ranking of obstacle pairs by separation distance.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::iter::FromIterator;

use serde::{Deserialize, Serialize};

use crate::ids::GeometryId;

/// Two geometries and their current separation distance.
///
/// Pairs are ordered by distance first. Equal distances fall back to the
/// geometry ids so that the order is total and deterministic. NaN distances
/// sort after every number.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct GeometryPairWithDistance {
    pub geom_a: GeometryId,
    pub geom_b: GeometryId,
    pub distance: f64,
}

impl GeometryPairWithDistance {
    pub fn new(geom_a: GeometryId, geom_b: GeometryId, distance: f64) -> Self {
        GeometryPairWithDistance {
            geom_a,
            geom_b,
            distance,
        }
    }
}

impl Ord for GeometryPairWithDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.geom_a.cmp(&other.geom_a))
            .then_with(|| self.geom_b.cmp(&other.geom_b))
    }
}

impl PartialOrd for GeometryPairWithDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GeometryPairWithDistance {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GeometryPairWithDistance {}

/// A min-queue of pairs: the closest pair comes out first.
#[derive(Clone, Debug, Default)]
pub struct PairQueue {
    heap: BinaryHeap<Reverse<GeometryPairWithDistance>>,
}

impl PairQueue {
    pub fn new() -> Self {
        PairQueue::default()
    }

    pub fn push(&mut self, pair: GeometryPairWithDistance) {
        self.heap.push(Reverse(pair));
    }

    pub fn pop_closest(&mut self) -> Option<GeometryPairWithDistance> {
        self.heap.pop().map(|Reverse(p)| p)
    }

    pub fn peek(&self) -> Option<&GeometryPairWithDistance> {
        self.heap.peek().map(|Reverse(p)| p)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl FromIterator<GeometryPairWithDistance> for PairQueue {
    fn from_iter<I: IntoIterator<Item = GeometryPairWithDistance>>(iter: I) -> Self {
        PairQueue {
            heap: iter.into_iter().map(Reverse).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    mod pairs {
        use crate::ids::GeometryId;
        use crate::pairs::{GeometryPairWithDistance, PairQueue};

        fn pair(a: u64, b: u64, d: f64) -> GeometryPairWithDistance {
            GeometryPairWithDistance::new(GeometryId::new(a), GeometryId::new(b), d)
        }

        #[test]
        fn test_order_by_distance() {
            assert!(pair(5, 6, 0.1) < pair(0, 1, 0.2));
            assert!(pair(0, 1, -1.0) < pair(0, 1, 0.0));
            assert!(pair(0, 1, 1e300) < pair(0, 1, f64::NAN));
        }

        #[test]
        fn test_ties_are_total() {
            let x = pair(0, 2, 0.5);
            let y = pair(1, 0, 0.5);
            assert!(x < y);
            assert!(!(y < x));
            assert_ne!(x, y);
            assert_eq!(x, pair(0, 2, 0.5));
            let mut v = vec![y, pair(0, 1, 0.5), x];
            v.sort();
            assert_eq!(v, vec![pair(0, 1, 0.5), x, y]);
        }

        #[test]
        fn test_queue_pops_closest_first() {
            let mut queue: PairQueue = vec![pair(0, 1, 3.0), pair(0, 2, 1.0), pair(1, 2, 2.0)]
                .into_iter()
                .collect();
            queue.push(pair(2, 3, 0.5));
            assert_eq!(queue.len(), 4);
            assert_eq!(queue.peek().map(|p| p.distance), Some(0.5));
            let order: Vec<f64> = std::iter::from_fn(|| queue.pop_closest())
                .map(|p| p.distance)
                .collect();
            assert_eq!(order, vec![0.5, 1.0, 2.0, 3.0]);
            assert!(queue.is_empty());
        }

        #[test]
        fn test_serialize() {
            let json = serde_json::to_string(&pair(1, 2, 0.25)).unwrap();
            let back: GeometryPairWithDistance = serde_json::from_str(&json).unwrap();
            assert_eq!(back, pair(1, 2, 0.25));
        }
    }
}
