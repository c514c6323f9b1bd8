//! The restructuring engine.
//!
//! Single-node rewiring connects additional drivers a permissible-function
//! tautology proves legal, then sheds fanins that became redundant. Pairwise
//! merging replaces two compatible nodes with one freshly wired node when
//! that saves wires. Both only ever commit a mutation after its feasibility
//! test passed; a failed test is an expected negative outcome, not an error.

use log::debug;

use crate::bdd::Overflow;
use crate::network::{NodeId, Network, Side};
use crate::opt::PfMode;
use crate::reference::Ref;

/// A merge candidate under construction. Lives entirely outside the node
/// arena until the merge commits.
struct Candidate {
    /// The target function the merged node must realize on its care set.
    target: Ref,
    /// The merged don't-care condition.
    care: Ref,
    fanins: Vec<NodeId>,
}

impl Network {
    /// Test whether `fanin` is a legal additional driver of `fanout`:
    /// `OR(func(fanout), G(fanout), func(fanin))` must be a tautology.
    /// Connects it (and repairs the processing order) when it is.
    pub(crate) fn try_connect(&mut self, fanin: NodeId, fanout: NodeId) -> Result<bool, Overflow> {
        if self.fanins(fanout).contains(&fanin) {
            return Ok(false);
        }
        let x = self.bdd.apply_or(self.func[fanout], self.gfunc[fanout]);
        let x = self.bdd.apply_or(x, self.func[fanin]).checked()?;
        if self.bdd.is_tautology(x) {
            self.connect(fanin, fanout, true);
            return Ok(true);
        }
        Ok(false)
    }

    fn reduce_after_connect(&mut self, id: NodeId, added: NodeId, weak: bool) {
        if weak {
            self.rewire_weak_reduce(id, added);
        } else if self.pf_mode == PfMode::MspfOnly {
            self.rewire_mspf_reduce(id);
        } else {
            self.rewire_eager_reduce(id, added);
        }
    }

    /// Cheapest policy: one local redundancy scan, drop the new edge again
    /// if it bought nothing, rebuild the node.
    fn rewire_weak_reduce(&mut self, id: NodeId, added: NodeId) {
        let wires = self.count_wires();
        self.remove_redundant_refresh(id);
        if self.is_empty_or_dead(id) || self.is_empty_or_dead(added) {
            return;
        }
        if wires == self.count_wires() {
            self.disconnect(added, id);
        }
        self.build_refresh(id);
    }

    /// Default policy: a fanin-cone CSPF after the connect; if that shed no
    /// wires, undo the connect instead; if it did, rebuild everything and
    /// run the configured permissible-function passes.
    fn rewire_eager_reduce(&mut self, id: NodeId, added: NodeId) {
        let wires = self.count_wires();
        self.cspf_fanin_cone_refresh(id);
        if wires == self.count_wires() {
            self.disconnect(added, id);
            self.build_cone_refresh(id);
            if self.is_empty_or_dead(id) {
                return;
            }
            self.cspf_fanin_cone_refresh(id);
            return;
        }
        self.build_all_refresh();
        if self.pf_mode.uses_mspf() {
            self.mspf_refresh();
        }
        if self.pf_mode.uses_cspf() {
            self.cspf_eager();
        }
    }

    fn rewire_mspf_reduce(&mut self, id: NodeId) {
        self.build_cone_refresh(id);
        self.mspf_refresh();
    }

    /// Single-node rewiring: for every live node, try every primary input
    /// and every live node outside its fanout cone as an additional driver,
    /// reducing after each successful connect. With `half`, the candidate
    /// pool is restricted to the fanin cones of the later half of the
    /// outputs.
    pub(crate) fn rewire(&mut self, weak: bool, half: bool) {
        let targets = self.objs.clone();
        let candidates: Vec<NodeId> = if half {
            let token = self.fresh_token();
            let pos = self.pos.clone();
            for &po in &pos[pos.len() / 2..] {
                self.mark_descendants(Side::Fanins, po, token);
            }
            self.objs
                .iter()
                .copied()
                .filter(|&id| self.is_marked(id, token))
                .collect()
        } else {
            self.objs.clone()
        };

        for (i, &id) in targets.iter().enumerate().rev() {
            if self.is_empty_or_dead(id) {
                continue;
            }
            debug!("rewire: node {} ({} of {})", id, i, targets.len());
            let token = self.fresh_token();
            self.set_mark(id, token);
            self.mark_descendants(Side::Fanouts, id, token);

            for j in 0..self.pis.len() {
                if self.is_empty_or_dead(id) {
                    break;
                }
                let pi = self.pis[j];
                if self.try_connect_refresh(pi, id) {
                    self.reduce_after_connect(id, pi, weak);
                }
            }
            for &cand in &candidates {
                if self.is_empty_or_dead(id) {
                    break;
                }
                if self.is_empty_or_dead(cand) || self.is_marked(cand, token) {
                    continue;
                }
                if self.try_connect_refresh(cand, id) {
                    self.reduce_after_connect(id, cand, weak);
                }
            }

            if weak {
                if self.is_empty_or_dead(id) {
                    continue;
                }
                self.cspf_fanin_cone_refresh(id);
                if self.is_empty_or_dead(id) {
                    continue;
                }
                self.build_all_refresh();
            }
        }
    }

    /// Test whether `fanin` may drive the detached candidate.
    fn try_connect_candidate(&self, cand: &mut Candidate, fanin: NodeId) -> Result<bool, Overflow> {
        if cand.fanins.contains(&fanin) {
            return Ok(false);
        }
        let x = self.bdd.apply_or(cand.target, cand.care);
        let x = self.bdd.apply_or(x, self.func[fanin]).checked()?;
        if self.bdd.is_tautology(x) {
            cand.fanins.push(fanin);
            return Ok(true);
        }
        Ok(false)
    }

    /// Shed candidate fanins that are redundant against the candidate's own
    /// care condition, without touching the arena.
    fn reduce_candidate(&self, cand: &mut Candidate) -> Result<(), Overflow> {
        let mut j = 0;
        while j < cand.fanins.len() {
            let fj = cand.fanins[j];
            let mut x = self.bdd.one();
            for (k, &fk) in cand.fanins.iter().enumerate() {
                if k != j {
                    x = self.bdd.apply_and(x, self.func[fk]);
                }
            }
            let x = self.bdd.apply_or(-x, cand.care);
            let y = self.bdd.apply_or(x, self.func[fj]).checked()?;
            if self.bdd.is_one(y) {
                cand.fanins.remove(j);
                continue;
            }
            j += 1;
        }
        Ok(())
    }

    /// One pairwise-merge sweep. Returns `true` when a merge committed (the
    /// scan must then restart: id reuse and new connectivity invalidate the
    /// pair ordering).
    fn merge_sweep(&mut self) -> bool {
        let targets = self.objs.clone();
        self.cspf_refresh();
        for i in (1..targets.len()).rev() {
            let id = targets[i];
            for j in (0..i).rev() {
                let idj = targets[j];
                if self.bdd.is_loaded() {
                    self.refresh();
                }
                if self.is_empty_or_dead(id) {
                    break;
                }
                if self.is_empty_or_dead(idj) {
                    continue;
                }
                if self.merge_pair(id, idj, &targets) {
                    return true;
                }
            }
        }
        false
    }

    /// Try to merge the pair `(id, idj)`; `true` on commit.
    fn merge_pair(&mut self, id: NodeId, idj: NodeId, targets: &[NodeId]) -> bool {
        debug!("merge: trying pair ({}, {})", id, idj);
        let fi = self.func[id];
        let fj = self.func[idj];
        let gi = self.gfunc[id];
        let gj = self.gfunc[idj];

        // Feasibility: where both functions matter they must agree.
        let f1 = self.bdd.apply_and(fi, fj);
        let f0 = self.bdd.apply_and(-fi, -fj);
        let x = self.bdd.apply_or(f1, f0);
        let y = self.bdd.apply_or(gi, gj);
        let x = self.bdd.apply_or(x, y);
        if !self.bdd.is_tautology(x) {
            return false;
        }

        // The merged target function and care condition.
        let a = self.bdd.apply_and(fi, -gi);
        let b = self.bdd.apply_and(fj, -gj);
        let x = self.bdd.apply_or(a, b);
        let x = self.bdd.apply_or(x, f1);
        let y = self.bdd.apply_and(gi, gj);
        if !x.is_valid() || !y.is_valid() {
            return false;
        }
        let mut cand = Candidate {
            target: x,
            care: y,
            fanins: Vec::new(),
        };

        // Anything downstream of either node would form a cycle.
        let token = self.fresh_token();
        self.set_mark(id, token);
        self.set_mark(idj, token);
        self.mark_descendants(Side::Fanouts, id, token);
        self.mark_descendants(Side::Fanouts, idj, token);

        // The acceptance constraint: connected drivers must pin the node's
        // NAND down to the target wherever the care condition holds. Each
        // added driver narrows it.
        let mut constraint = self.bdd.apply_or(-x, y);
        let mut acc = self.bdd.one();

        let pool: Vec<NodeId> = self
            .pis
            .iter()
            .chain(targets.iter())
            .copied()
            .collect();
        for cand_driver in pool {
            if !self.is_pi(cand_driver)
                && (self.is_empty_or_dead(cand_driver) || self.is_marked(cand_driver, token))
            {
                continue;
            }
            match self.try_connect_candidate(&mut cand, cand_driver) {
                Ok(true) => {
                    if self.bdd.is_one(constraint) || !constraint.is_valid() || !acc.is_valid() {
                        break;
                    }
                    acc = self.bdd.apply_and(acc, self.func[cand_driver]);
                    constraint = self.bdd.apply_or(constraint, -acc);
                }
                Ok(false) => {}
                Err(Overflow) => return false,
            }
        }

        if cand.fanins.is_empty() || !constraint.is_valid() || !self.bdd.is_one(constraint) {
            return false;
        }

        // Order and reduce the candidate's fanins before judging the win.
        self.rank_all();
        let rank_of = |f: &NodeId| self.rank_value(*f);
        cand.fanins.sort_by_key(rank_of);
        if self.reduce_candidate(&mut cand).is_err() || cand.fanins.is_empty() {
            return false;
        }
        let wire = self.fanins(id).len() + self.fanins(idj).len();
        if cand.fanins.len() > wire - 1 {
            return false;
        }

        // Commit: only now does the arena change.
        let new_id = self
            .next_empty_slot(1)
            .expect("node id space exhausted during merge");
        debug!("merge: committing ({}, {}) -> {}", id, idj, new_id);
        self.alloc_node(new_id);
        self.gfunc[new_id] = cand.care;
        for &f in &cand.fanins {
            self.connect(f, new_id, false);
        }
        for k in self.fanouts(id).to_vec() {
            self.connect(new_id, k, false);
        }
        for k in self.fanouts(idj).to_vec() {
            if !self.fanouts(new_id).contains(&k) {
                self.connect(new_id, k, false);
            }
        }
        self.obj_entry(new_id);
        self.remove_node(id);
        self.remove_node(idj);
        self.build_cone_refresh(new_id);
        self.cspf_refresh();
        true
    }

    /// Pairwise merging to a fixpoint: sweep all pairs in reverse processing
    /// order, restarting after every committed merge.
    pub(crate) fn merge_pairs(&mut self) {
        while self.merge_sweep() {}
    }
}
