//! The capacity/refresh manager.
//!
//! Every diagram-producing step in the engine returns `Result<_, Overflow>`.
//! This module owns the single recovery path: discard the manager, grow its
//! capacity exponent, and replay the interrupted computation from its safe
//! entry point (external don't-care composition, full function rebuild, full
//! permissible-function pass). All handles from the old manager are void
//! after a refresh, which is why nothing ever resumes mid-computation.

use log::debug;

use crate::bdd::Bdd;
use crate::network::{Network, NodeId};
use crate::opt::PfMode;

impl Network {
    /// Bump the capacity exponent. More than 31 doublings is a resource
    /// configuration failure with no smaller-scope recovery.
    pub(crate) fn grow_exponent(&mut self) {
        self.exponent += 1;
        if self.exponent > 31 {
            panic!("refresh failed: diagram capacity limit exceeded");
        }
    }

    fn grow_while_loaded(&mut self) {
        while self.bdd.is_loaded() {
            self.grow_exponent();
            self.bdd.grow();
        }
    }

    fn rebuild(&mut self) -> Result<(), crate::bdd::Overflow> {
        self.compose_dc()?;
        self.build_all()
    }

    /// Initial diagram construction: compose don't-cares and build every
    /// function, growing the manager until both fit, then pre-emptively
    /// while it stays more than half full.
    pub(crate) fn init_build(&mut self) {
        while self.rebuild().is_err() {
            self.grow_exponent();
            self.bdd = Bdd::new(self.num_pis(), self.exponent, self.var_order.as_deref());
        }
        self.grow_while_loaded();
    }

    fn replay(&mut self, use_mspf: bool) -> Result<(), crate::bdd::Overflow> {
        self.rebuild()?;
        if use_mspf {
            self.mspf()
        } else {
            self.cspf()
        }
    }

    fn refresh_replay(&mut self, use_mspf: bool) {
        loop {
            self.bdd = Bdd::new(self.num_pis(), self.exponent, self.var_order.as_deref());
            if self.replay(use_mspf).is_ok() {
                break;
            }
            self.grow_exponent();
        }
        self.grow_while_loaded();
        debug!(
            "refresh: reallocated at 2^{}, {} nodes live",
            self.exponent,
            self.bdd.num_nodes()
        );
    }

    /// Discard the manager and replay from the safe entry point. The first
    /// attempt reuses the current capacity (a fresh manager drops all
    /// garbage); only repeated failure grows it.
    pub(crate) fn refresh(&mut self) {
        debug!("refresh: diagram capacity exhausted");
        self.refresh_replay(self.pf_mode == PfMode::MspfOnly);
    }

    pub(crate) fn build_refresh(&mut self, id: NodeId) {
        if self.build(id).is_err() {
            self.refresh();
        }
    }

    pub(crate) fn build_all_refresh(&mut self) {
        if self.build_all().is_err() {
            self.refresh();
        }
    }

    pub(crate) fn build_cone_refresh(&mut self, start: NodeId) {
        if self.build_cone(start).is_err() {
            self.refresh();
        }
    }

    pub(crate) fn cspf_refresh(&mut self) {
        if self.cspf().is_err() {
            self.refresh();
        }
    }

    pub(crate) fn cspf_fanin_cone_refresh(&mut self, start: NodeId) {
        if self.cspf_fanin_cone(start).is_err() {
            self.refresh();
        }
    }

    /// MSPF with recovery: a failing pass is replayed (with MSPF, whatever
    /// the configured mode) on a regrown manager.
    pub(crate) fn mspf_refresh(&mut self) {
        if self.mspf().is_ok() {
            return;
        }
        self.refresh_replay(true);
    }

    /// Redundant-fanin removal with recovery; gives up when the node itself
    /// dies during a replay.
    pub(crate) fn remove_redundant_refresh(&mut self, id: NodeId) {
        if self.remove_redundant_fanins(id).is_ok() {
            return;
        }
        self.refresh();
        loop {
            if self.is_empty_or_dead(id) {
                return;
            }
            if self.remove_redundant_fanins(id).is_ok() {
                return;
            }
            self.grow_exponent();
            self.refresh();
        }
    }

    /// Candidate-edge test with recovery: returns whether the edge was
    /// added, or `false` when either endpoint dies during a replay.
    pub(crate) fn try_connect_refresh(&mut self, fanin: NodeId, fanout: NodeId) -> bool {
        let mut first = true;
        loop {
            match self.try_connect(fanin, fanout) {
                Ok(connected) => return connected,
                Err(_) => {
                    if !first {
                        self.grow_exponent();
                    }
                    self.refresh();
                    first = false;
                    if self.is_empty_or_dead(fanin) || self.is_empty_or_dead(fanout) {
                        return false;
                    }
                }
            }
        }
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

    fn wide_source() -> Aig {
        // out = (a & b) | (c & d) | (e & f): enough structure to overflow a
        // tiny manager.
        let mut aig = Aig::new();
        let ins: Vec<_> = (0..6).map(|_| aig.add_input()).collect();
        let ab = aig.and(ins[0], ins[1]);
        let cd = aig.and(ins[2], ins[3]);
        let ef = aig.and(ins[4], ins[5]);
        let x = aig.or(ab, cd);
        let out = aig.or(x, ef);
        aig.add_output(out);
        aig
    }

    #[test]
    fn test_refresh_transparency() {
        // A starved manager (2^3 nodes) must produce exactly the same final
        // network as an ample one; only the refresh count differs.
        let mut starved = Network::from_aig(wide_source(), 3, PfMode::Cspf, None);
        starved.init_build();
        starved.cspf_eager();

        let mut ample = Network::from_aig(wide_source(), 16, PfMode::Cspf, None);
        ample.init_build();
        ample.cspf_eager();

        assert!(starved.check());
        assert!(starved.exponent > 3);
        assert_eq!(starved.count_wires(), ample.count_wires());

        let a = starved.export();
        let b = ample.export();
        for k in 0..64 {
            let v = bits(6, k);
            assert_eq!(a.eval(&v), b.eval(&v));
        }
    }

    #[test]
    fn test_init_build_grows_until_fit() {
        let mut net = Network::from_aig(wide_source(), 3, PfMode::Cspf, None);
        net.init_build();
        // After the build the manager is at most half full.
        assert!(!net.bdd.is_loaded());
        assert!(net.check());
    }
}
