//! Deferred-acceptance (Gale–Shapley) matching.
//!
//! Grooms propose in order of preference; a bride keeps the best proposer
//! seen so far and releases the previous one. The result is stable: no groom
//! and bride both prefer each other to their assigned partners.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;

/// One ranked entry of a preference list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<T> {
    pub node: T,
    pub distance: f64,
}

impl<T> Candidate<T> {
    pub fn new(node: T, distance: f64) -> Self {
        Self { node, distance }
    }
}

/// Sorts a preference list best-first: ascending distance, then node order.
pub fn order_candidates<T: Ord>(list: &mut [Candidate<T>]) {
    list.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.node.cmp(&b.node))
    });
}

/// Outcome of a matching round.
#[derive(Debug, Clone, PartialEq)]
pub struct Matching<G, B> {
    /// bride -> groom
    pub pairs: BTreeMap<B, G>,
    /// Grooms that exhausted their preference list
    pub unmatched_grooms: Vec<G>,
    pub unmatched_brides: Vec<B>,
}

/// Runs groom-proposing deferred acceptance.
///
/// Preference lists must already be ordered best-first. A bride never
/// accepts a groom missing from her own list.
pub fn stable_match<G, B>(
    grooms: &BTreeMap<G, Vec<Candidate<B>>>,
    brides: &BTreeMap<B, Vec<Candidate<G>>>,
) -> Matching<G, B>
where
    G: Ord + Copy + Hash,
    B: Ord + Copy,
{
    let ranks: BTreeMap<B, HashMap<G, usize>> = brides
        .iter()
        .map(|(b, prefs)| {
            let mut rank = HashMap::with_capacity(prefs.len());
            for (i, c) in prefs.iter().enumerate() {
                rank.entry(c.node).or_insert(i);
            }
            (*b, rank)
        })
        .collect();

    let mut next_choice: BTreeMap<G, usize> = grooms.keys().map(|g| (*g, 0)).collect();
    let mut free: VecDeque<G> = grooms.keys().copied().collect();
    let mut engaged: BTreeMap<B, G> = BTreeMap::new();
    let mut unmatched_grooms = Vec::new();

    while let Some(groom) = free.pop_front() {
        let prefs = &grooms[&groom];
        let Some(choice) = next_choice.get_mut(&groom) else {
            continue;
        };
        if *choice >= prefs.len() {
            unmatched_grooms.push(groom);
            continue;
        }
        let bride = prefs[*choice].node;
        *choice += 1;

        let Some(rank) = ranks.get(&bride) else {
            free.push_front(groom);
            continue;
        };
        let Some(&proposer_rank) = rank.get(&groom) else {
            free.push_front(groom);
            continue;
        };

        match engaged.get(&bride).copied() {
            None => {
                engaged.insert(bride, groom);
            }
            Some(current) => {
                let current_rank = rank.get(&current).copied().unwrap_or(usize::MAX);
                if proposer_rank < current_rank {
                    engaged.insert(bride, groom);
                    free.push_back(current);
                } else {
                    free.push_front(groom);
                }
            }
        }
    }

    let unmatched_brides = brides
        .keys()
        .filter(|b| !engaged.contains_key(b))
        .copied()
        .collect();
    unmatched_grooms.sort();

    Matching {
        pairs: engaged,
        unmatched_grooms,
        unmatched_brides,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs<T: Copy>(order: &[T]) -> Vec<Candidate<T>> {
        order
            .iter()
            .enumerate()
            .map(|(i, n)| Candidate::new(*n, i as f64))
            .collect()
    }

    fn rank_of<T: PartialEq>(list: &[Candidate<T>], x: T) -> Option<usize> {
        list.iter().position(|c| c.node == x)
    }

    /// True if `list` ranks `x` above the current partner (or there is none).
    fn prefers<T: PartialEq + Copy>(list: &[Candidate<T>], x: T, current: Option<T>) -> bool {
        match (rank_of(list, x), current) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(rx), Some(cur)) => rank_of(list, cur).map_or(true, |rc| rx < rc),
        }
    }

    /// No groom/bride pair prefers each other over their assigned partners.
    fn assert_stable(
        grooms: &BTreeMap<char, Vec<Candidate<u32>>>,
        brides: &BTreeMap<u32, Vec<Candidate<char>>>,
        matching: &Matching<char, u32>,
    ) {
        let partner_of_groom: BTreeMap<char, u32> =
            matching.pairs.iter().map(|(b, g)| (*g, *b)).collect();

        for (g, g_prefs) in grooms {
            for c in g_prefs {
                let b = c.node;
                let g_wants = prefers(g_prefs, b, partner_of_groom.get(g).copied());
                let b_wants = prefers(&brides[&b], *g, matching.pairs.get(&b).copied());
                assert!(!(g_wants && b_wants), "blocking pair ({}, {})", g, b);
            }
        }
    }

    #[test]
    fn test_everyone_gets_first_choice() {
        let grooms = BTreeMap::from([('a', prefs(&[1u32, 2, 3])), ('b', prefs(&[2, 3, 1])), ('c', prefs(&[3, 1, 2]))]);
        let brides = BTreeMap::from([(1u32, prefs(&['a', 'b', 'c'])), (2, prefs(&['b', 'c', 'a'])), (3, prefs(&['c', 'a', 'b']))]);

        let m = stable_match(&grooms, &brides);
        assert_eq!(m.pairs, BTreeMap::from([(1, 'a'), (2, 'b'), (3, 'c')]));
        assert!(m.unmatched_grooms.is_empty());
        assert!(m.unmatched_brides.is_empty());
        assert_stable(&grooms, &brides, &m);
    }

    #[test]
    fn test_contested_brides() {
        // Every groom ranks 1 > 2 > 3; every bride ranks c > b > a
        let grooms = BTreeMap::from([('a', prefs(&[1u32, 2, 3])), ('b', prefs(&[1, 2, 3])), ('c', prefs(&[1, 2, 3]))]);
        let brides = BTreeMap::from([(1u32, prefs(&['c', 'b', 'a'])), (2, prefs(&['c', 'b', 'a'])), (3, prefs(&['c', 'b', 'a']))]);

        let m = stable_match(&grooms, &brides);
        assert_eq!(m.pairs, BTreeMap::from([(1, 'c'), (2, 'b'), (3, 'a')]));
        assert_stable(&grooms, &brides, &m);
    }

    #[test]
    fn test_groom_proposing_optimum() {
        // Two stable matchings exist; groom proposals pick the groom-optimal one
        let grooms = BTreeMap::from([('a', prefs(&[1u32, 2, 3])), ('b', prefs(&[2, 1, 3])), ('c', prefs(&[1, 2, 3]))]);
        let brides = BTreeMap::from([(1u32, prefs(&['b', 'a', 'c'])), (2, prefs(&['a', 'b', 'c'])), (3, prefs(&['a', 'b', 'c']))]);

        let m = stable_match(&grooms, &brides);
        assert_eq!(m.pairs, BTreeMap::from([(1, 'a'), (2, 'b'), (3, 'c')]));
        assert_stable(&grooms, &brides, &m);
    }

    #[test]
    fn test_short_lists_leave_partners_unmatched() {
        let grooms = BTreeMap::from([('a', prefs(&[1u32])), ('b', prefs(&[1]))]);
        let brides = BTreeMap::from([(1u32, prefs(&['b', 'a'])), (2, Vec::new())]);

        let m = stable_match(&grooms, &brides);
        assert_eq!(m.pairs, BTreeMap::from([(1, 'b')]));
        assert_eq!(m.unmatched_grooms, vec!['a']);
        assert_eq!(m.unmatched_brides, vec![2]);
    }

    #[test]
    fn test_order_candidates_breaks_ties_by_node() {
        let mut list = vec![Candidate::new(7u32, 2.0), Candidate::new(3, 1.0), Candidate::new(5, 1.0)];
        order_candidates(&mut list);
        let order: Vec<u32> = list.iter().map(|c| c.node).collect();
        assert_eq!(order, vec![3, 5, 7]);
    }
}
