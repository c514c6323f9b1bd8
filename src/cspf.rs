//! The permissible-function engine.
//!
//! Computes per-node G functions (global don't-care conditions) and per-fanin
//! C functions (conditions under which one fanin's value is irrelevant), and
//! removes the fanin edges those conditions prove redundant. CSPF treats the
//! fanins of each node one after another and is sound under any fanout
//! structure; MSPF is exact under fanout reconvergence at the cost of
//! rebuilding fanout cones with the node inverted.

use crate::bdd::Overflow;
use crate::network::{Network, NodeId, Side};
use crate::reference::Ref;

impl Network {
    /// The G function of a node: the AND over its fanouts of the condition
    /// under which the fanout tolerates an arbitrary value on this edge.
    pub(crate) fn compute_gfunc(&mut self, id: NodeId) -> Result<(), Overflow> {
        let mut x = self.bdd.one();
        for i in 0..self.fanouts(id).len() {
            let k = self.fanouts(id)[i];
            let y = if self.is_po(k) {
                // Zero unless an external don't-care was composed.
                self.gfunc[k]
            } else {
                let pos = self
                    .fanins(k)
                    .iter()
                    .position(|&f| f == id)
                    .expect("mirror edge");
                self.cfunc(k, pos)
            };
            x = self.bdd.apply_and(x, y);
        }
        self.gfunc[id] = x.checked()?;
        Ok(())
    }

    /// Remove every fanin the plain redundancy test proves removable:
    /// `OR(NOT(AND of the other fanins), G(id), func(fanin))` a tautology.
    pub(crate) fn remove_redundant_fanins(&mut self, id: NodeId) -> Result<(), Overflow> {
        let mut j = 0;
        while j < self.fanins(id).len() {
            let fj = self.fanins(id)[j];
            let mut x = self.bdd.one();
            for k in 0..self.fanins(id).len() {
                if k != j {
                    let fk = self.fanins(id)[k];
                    x = self.bdd.apply_and(x, self.func[fk]);
                }
            }
            let x = self.bdd.apply_or(-x, self.gfunc[id]);
            let y = self.bdd.apply_or(x, self.func[fj]).checked()?;
            if self.bdd.is_one(y) {
                self.disconnect(fj, id);
                if self.fanins(id).is_empty() {
                    self.splice_to_const(id);
                    return Ok(());
                }
                continue; // indices shifted; re-test the same position
            }
            j += 1;
        }
        Ok(())
    }

    /// Per-fanin C functions of one node under CSPF, with redundant edges
    /// removed along the way.
    ///
    /// Each fanin's condition is computed against the fanins *after* it
    /// only, which keeps the conditions of one node mutually compatible.
    pub(crate) fn cfunc_cspf(&mut self, id: NodeId) -> Result<(), Overflow> {
        if self.is_empty_or_dead(id) {
            return Ok(());
        }
        let mut cfuncs: Vec<Ref> = Vec::with_capacity(self.fanins(id).len());
        let mut j = 0;
        while j < self.fanins(id).len() {
            let fj = self.fanins(id)[j];
            let mut x = self.bdd.one();
            for k in j + 1..self.fanins(id).len() {
                let fk = self.fanins(id)[k];
                x = self.bdd.apply_and(x, self.func[fk]);
            }
            let x = self.bdd.apply_or(-x, self.gfunc[id]);
            let agree = self.bdd.apply_and(self.func[id], self.func[fj]);
            let x = self.bdd.apply_or(x, agree);
            let y = self.bdd.apply_or(x, self.func[fj]).checked()?;
            if self.bdd.is_one(y) {
                self.disconnect(fj, id);
                if self.fanins(id).is_empty() {
                    self.splice_to_const(id);
                    return Ok(());
                }
                continue;
            }
            cfuncs.push(x);
            j += 1;
        }
        self.set_cfuncs(id, cfuncs);
        Ok(())
    }

    /// One full CSPF pass in reverse processing order, followed by a full
    /// function rebuild.
    pub(crate) fn cspf(&mut self) -> Result<(), Overflow> {
        let mut i = self.objs.len();
        while i > 0 {
            i -= 1;
            let id = self.objs[i];
            if self.is_dead(id) {
                self.remove_node(id);
                continue;
            }
            self.compute_gfunc(id)?;
            self.cfunc_cspf(id)?;
        }
        self.build_all()
    }

    /// CSPF restricted to a node and its fanin cone.
    pub(crate) fn cspf_fanin_cone(&mut self, start: NodeId) -> Result<(), Overflow> {
        self.cfunc_cspf(start)?;
        let targets = self.descendant_list(Side::Fanins, start);
        for &id in targets.iter().rev() {
            if self.is_empty(id) {
                continue;
            }
            if self.is_dead(id) {
                self.remove_node(id);
                continue;
            }
            self.compute_gfunc(id)?;
            self.cfunc_cspf(id)?;
        }
        Ok(())
    }

    /// Run CSPF to a local fixpoint: rank nodes, sort fanins by rank, sweep,
    /// and repeat while the wire count keeps dropping.
    pub(crate) fn cspf_eager(&mut self) {
        let mut wires = 0;
        while wires != self.count_wires() {
            wires = self.count_wires();
            self.rank_all();
            self.sort_fanins_all();
            self.cspf_refresh();
        }
    }

    /// Does the fanout cone of `id` reconverge? Each immediate fanout's cone
    /// is walked under its own branch token; meeting a node tagged by an
    /// earlier branch means two paths reunite.
    pub(crate) fn reconvergent(&mut self, id: NodeId) -> bool {
        let branches = self.fanouts(id).to_vec();
        let base = self.fresh_tokens(branches.len() as u64);
        for (s, &start) in branches.iter().enumerate() {
            let tok = base + s as u64;
            let mut stack = vec![start];
            while let Some(n) = stack.pop() {
                if self.is_po(n) {
                    continue;
                }
                let m = self.mark_of(n);
                if m == tok {
                    continue;
                }
                if m >= base {
                    return true;
                }
                self.set_mark(n, tok);
                stack.extend_from_slice(self.fanouts(n));
            }
        }
        false
    }

    /// The G function of a node under MSPF. For a non-reconvergent fanout
    /// cone this is the CSPF formula; otherwise the cone is rebuilt with the
    /// node inverted and each primary output contributes the condition where
    /// the inversion is unobservable.
    pub(crate) fn gfunc_mspf(&mut self, id: NodeId) -> Result<(), Overflow> {
        if !self.reconvergent(id) {
            return self.compute_gfunc(id);
        }
        let old: Vec<Ref> = self
            .pos
            .iter()
            .map(|&po| self.func[self.fanins(po)[0]])
            .collect();
        self.build_cone_inverted(id)?;
        let mut x = self.bdd.one();
        for (j, &po) in self.pos.clone().iter().enumerate() {
            let drv = self.fanins(po)[0];
            let cur = if drv == id {
                -self.func[drv]
            } else {
                self.func[drv]
            };
            let y = self.bdd.apply_xnor(cur, old[j]);
            let y = self.bdd.apply_or(y, self.gfunc[po]);
            x = self.bdd.apply_and(x, y).checked()?;
        }
        self.gfunc[id] = x;
        self.build_cone(id)
    }

    /// Per-fanin C functions under MSPF. Returns `true` when a redundant
    /// edge was removed: downstream conditions are stale then and the whole
    /// pass must restart.
    pub(crate) fn cfunc_mspf(&mut self, id: NodeId) -> Result<bool, Overflow> {
        let mut cfuncs: Vec<Ref> = Vec::with_capacity(self.fanins(id).len());
        for j in 0..self.fanins(id).len() {
            let fj = self.fanins(id)[j];
            let mut x = self.bdd.one();
            for k in 0..self.fanins(id).len() {
                if k != j {
                    let fk = self.fanins(id)[k];
                    x = self.bdd.apply_and(x, self.func[fk]);
                }
            }
            let x = self.bdd.apply_or(-x, self.gfunc[id]);
            let y = self.bdd.apply_or(x, self.func[fj]).checked()?;
            if self.bdd.is_one(y) {
                self.disconnect(fj, id);
                if self.fanins(id).is_empty() {
                    self.splice_to_const(id);
                }
                return Ok(true);
            }
            cfuncs.push(x);
        }
        self.set_cfuncs(id, cfuncs);
        Ok(false)
    }

    /// One full MSPF pass. Restarts from the output side whenever an edge is
    /// removed.
    pub(crate) fn mspf(&mut self) -> Result<(), Overflow> {
        let mut i = self.objs.len();
        while i > 0 {
            i -= 1;
            let id = self.objs[i];
            if self.is_dead(id) {
                self.remove_node(id);
                continue;
            }
            self.gfunc_mspf(id)?;
            if self.cfunc_mspf(id)? {
                self.build_all()?;
                i = self.objs.len();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::aig::Aig;
    use crate::network::Network;
    use crate::opt::PfMode;

    fn bits(n: usize, k: usize) -> Vec<bool> {
        (0..n).map(|i| (k >> i) & 1 != 0).collect()
    }

    fn equivalent(a: &Aig, b: &Aig) -> bool {
        assert_eq!(a.num_inputs(), b.num_inputs());
        (0..1usize << a.num_inputs()).all(|k| {
            let v = bits(a.num_inputs(), k);
            a.eval(&v) == b.eval(&v)
        })
    }

    fn and_or_source() -> Aig {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let d = aig.add_input();
        let ab = aig.and(a, b);
        let cd = aig.and(c, d);
        let out = aig.or(ab, cd);
        aig.add_output(out);
        aig
    }

    #[test]
    fn test_cspf_keeps_and_or_exact() {
        let source = and_or_source();
        let mut net = Network::from_aig(source.clone(), 12, PfMode::Cspf, None);
        net.build_all().unwrap();
        net.cspf_eager();
        assert!(net.check());
        // No external don't-cares: the function must be preserved exactly.
        let exported = net.export();
        assert!(equivalent(&source, &exported));
        // No fanin of a live node may still pass the redundancy test.
        let wires = net.count_wires();
        net.cspf_eager();
        assert_eq!(wires, net.count_wires());
    }

    #[test]
    fn test_cspf_fixpoint_idempotent() {
        let source = and_or_source();
        let mut net = Network::from_aig(source, 12, PfMode::Cspf, None);
        net.build_all().unwrap();
        net.cspf_eager();
        let wires = net.count_wires();
        let gates = net.objs.len();
        net.cspf_eager();
        assert_eq!(net.count_wires(), wires);
        assert_eq!(net.objs.len(), gates);
    }

    #[test]
    fn test_cspf_prunes_shared_redundant_input() {
        // Two independent cones sharing one input that is redundant in both;
        // a single CSPF pass must prune it from each, dropping at least two
        // wires.
        //
        //   o0 = (a & c) | a  ==  a   (the c edge is redundant)
        //   o1 = (b & c) | b  ==  b
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let ac = aig.and(a, c);
        let bc = aig.and(b, c);
        let o0 = aig.or(ac, a);
        let o1 = aig.or(bc, b);
        aig.add_output(o0);
        aig.add_output(o1);

        let mut net = Network::from_aig(aig.clone(), 12, PfMode::Cspf, None);
        net.build_all().unwrap();
        let before = net.count_wires();
        net.cspf_refresh();
        let after = net.count_wires();
        assert!(net.check());
        assert!(before >= after + 2);
        let exported = net.export();
        assert!(equivalent(&aig, &exported));
        // The shared input no longer reaches anything.
        for k in 0..8 {
            let mut v = bits(3, k);
            let base = exported.eval(&v);
            v[2] = !v[2];
            assert_eq!(exported.eval(&v), base);
        }
    }

    #[test]
    fn test_reconvergence_detection() {
        // s feeds two paths that reunite at an OR: reconvergent.
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let s = aig.and(a, b);
        let p = aig.and(s, c);
        let q = aig.and(s, !c);
        let out = aig.or(p, q);
        aig.add_output(out);

        let mut net = Network::from_aig(aig, 12, PfMode::Mspf, None);
        net.build_all().unwrap();
        let ids: Vec<_> = net.objs.clone();
        let any = ids
            .iter()
            .any(|&id| net.fanouts(id).len() >= 2 && net.reconvergent(id));
        assert!(any);

        // A straight chain never reconverges.
        let mut chain = Aig::new();
        let a = chain.add_input();
        let b = chain.add_input();
        let x = chain.and(a, b);
        chain.add_output(x);
        let mut cnet = Network::from_aig(chain, 12, PfMode::Mspf, None);
        cnet.build_all().unwrap();
        let ids: Vec<_> = cnet.objs.clone();
        assert!(ids.iter().all(|&id| !cnet.reconvergent(id)));
    }

    #[test]
    fn test_mspf_beats_cspf_on_reconvergence() {
        // out = (v ^ a) ^ v == a with v = b & c. Flipping v flips both xor
        // operands and cancels, so exact observability finds v's global
        // condition to be a tautology and deletes it. An xor structure has
        // no per-edge redundancy, so CSPF (which only intersects the edge
        // conditions) keeps it.
        let build = || {
            let mut aig = Aig::new();
            let a = aig.add_input();
            let b = aig.add_input();
            let c = aig.add_input();
            let v = aig.and(b, c);
            let t = {
                let x = aig.and(v, !a);
                let y = aig.and(!v, a);
                aig.or(x, y)
            };
            let out = {
                let x = aig.and(t, !v);
                let y = aig.and(!t, v);
                aig.or(x, y)
            };
            aig.add_output(out);
            aig
        };

        let mut cspf_net = Network::from_aig(build(), 12, PfMode::Cspf, None);
        cspf_net.build_all().unwrap();
        cspf_net.cspf_eager();
        assert!(cspf_net.check());

        let mut mspf_net = Network::from_aig(build(), 12, PfMode::Mspf, None);
        mspf_net.build_all().unwrap();
        mspf_net.mspf_refresh();
        mspf_net.cspf_eager();
        assert!(mspf_net.check());

        let exported = mspf_net.export();
        assert!(equivalent(&build(), &exported));
        assert!(mspf_net.count_wires() < cspf_net.count_wires());
    }

    #[test]
    fn test_monotonic_wire_count() {
        let source = and_or_source();
        let mut net = Network::from_aig(source, 12, PfMode::Cspf, None);
        net.build_all().unwrap();
        let mut last = net.count_wires();
        for _ in 0..4 {
            net.cspf_refresh();
            let now = net.count_wires();
            assert!(now <= last);
            last = now;
        }
    }
}
