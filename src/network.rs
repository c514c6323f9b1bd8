use std::io::Write;

use log::error;

use crate::aig::{Aig, Obj, Signal};
use crate::bdd::{Bdd, Overflow};
use crate::opt::PfMode;
use crate::reference::Ref;

pub type NodeId = usize;

/// The constant-FALSE node. It has no fanin list and is never processed.
pub const CONST0: NodeId = 0;

/// Where a window input gets its value from once windows are stitched back
/// together.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InputSource {
    /// Output `index` of window `window`.
    Window { window: usize, index: usize },
    /// Global primary input `index`.
    External(usize),
    /// The external constant-FALSE.
    Const0,
}

/// Aggregate size counters, logged after each pass.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct NetStats {
    pub gates: usize,
    pub wires: usize,
}

impl std::fmt::Display for NetStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gates = {}, wires = {}, literals = {}",
            self.gates,
            self.wires,
            self.wires - self.gates
        )
    }
}

/// Which adjacency side a traversal walks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Side {
    Fanins,
    Fanouts,
}

/// A single-output NAND network annotated with diagram handles.
///
/// The id space is fixed at construction: source object `i` owns the direct
/// node `i` and the inverted twin `i + offset`; primary outputs live past
/// `2 * offset`. A node is *absent* when neither adjacency list exists; a
/// node with no fanin list is a primary input, one with no fanout list a
/// primary output. Removed ids become reusable empty slots.
pub struct Network {
    offset: usize,
    pub(crate) bdd: Bdd,
    pub(crate) exponent: usize,
    pub(crate) pf_mode: PfMode,
    pub(crate) var_order: Option<Vec<u32>>,

    pub(crate) pis: Vec<NodeId>,
    pub(crate) pos: Vec<NodeId>,
    /// Live internal nodes in a topologically consistent processing order.
    pub(crate) objs: Vec<NodeId>,

    fanins: Vec<Option<Vec<NodeId>>>,
    fanouts: Vec<Option<Vec<NodeId>>>,
    /// Global function of each node (NAND of its fanins' functions).
    pub(crate) func: Vec<Ref>,
    /// Per-node G function: the don't-care condition of the node's output.
    /// For primary outputs this is the externally supplied don't-care.
    pub(crate) gfunc: Vec<Ref>,
    /// Per-fanin C functions, aligned by position with `fanins`: the
    /// condition under which that fanin's value is irrelevant.
    cfuncs: Vec<Vec<Ref>>,
    rank: Vec<u32>,

    mark: Vec<u64>,
    token: u64,

    /// The window's own source graph, kept for export and don't-care work.
    pub(crate) source: Aig,
    pub(crate) input_sources: Vec<InputSource>,
    /// Externally supplied don't-care sub-graphs, one list per output.
    pub(crate) dc: Vec<Vec<Aig>>,
    /// Global object ids feeding this window, when partitioned.
    pub(crate) window_inputs: Option<Vec<usize>>,
}

impl Network {
    /// Build the two-polarity NAND network from a source graph and allocate
    /// its diagram manager with `2^exponent` capacity.
    pub fn from_aig(
        source: Aig,
        exponent: usize,
        pf_mode: PfMode,
        var_order: Option<Vec<u32>>,
    ) -> Self {
        let offset = source.num_objs();
        let capacity = 2 * offset + source.num_outputs();
        // The manager must at least hold its variables; undersized configs
        // start one doubling up instead of failing.
        let mut exponent = exponent;
        while (1usize << exponent) <= source.num_inputs() + 1 {
            exponent += 1;
        }
        let bdd = Bdd::new(source.num_inputs(), exponent, var_order.as_deref());

        let mut net = Self {
            offset,
            bdd,
            exponent,
            pf_mode,
            var_order,
            pis: Vec::with_capacity(source.num_inputs()),
            pos: Vec::with_capacity(source.num_outputs()),
            objs: Vec::new(),
            fanins: vec![None; capacity],
            fanouts: vec![None; capacity],
            func: vec![Ref::INVALID; capacity],
            gfunc: vec![Ref::INVALID; capacity],
            cfuncs: vec![Vec::new(); capacity],
            rank: vec![0; capacity],
            mark: vec![0; capacity],
            token: 0,
            input_sources: (0..source.num_inputs())
                .map(InputSource::External)
                .collect(),
            dc: vec![Vec::new(); source.num_outputs()],
            window_inputs: None,
            source,
        };
        net.gfunc.fill(net.bdd.zero());
        net.wire_from_source();
        net
    }

    fn wire_from_source(&mut self) {
        let offset = self.offset;

        // The constant and its inverted twin.
        self.func[CONST0] = self.bdd.zero();
        self.fanouts[CONST0] = Some(Vec::new());
        let twin = CONST0 + offset;
        self.fanins[twin] = Some(Vec::new());
        self.fanouts[twin] = Some(Vec::new());
        self.objs.push(twin);
        self.connect(CONST0, twin, false);

        for i in 0..self.source.num_objs() {
            match self.source.obj(i) {
                Obj::Const0 => {}
                Obj::Input(k) => {
                    self.func[i] = self.bdd.ith_var(k);
                    self.fanouts[i] = Some(Vec::new());
                    self.pis.push(i);
                    let twin = i + offset;
                    self.fanins[twin] = Some(Vec::new());
                    self.fanouts[twin] = Some(Vec::new());
                    self.objs.push(twin);
                    self.connect(i, twin, false);
                }
                Obj::And(a, b) => {
                    self.fanins[i] = Some(Vec::new());
                    self.fanouts[i] = Some(Vec::new());
                    self.connect(self.polarity_node(a), i, false);
                    self.connect(self.polarity_node(b), i, false);
                    self.objs.push(i);
                    let twin = i + offset;
                    self.fanins[twin] = Some(Vec::new());
                    self.fanouts[twin] = Some(Vec::new());
                    self.connect(i, twin, false);
                    self.objs.push(twin);
                }
            }
        }

        for i in 0..self.source.num_outputs() {
            let s = self.source.output(i);
            let id = 2 * offset + i;
            self.fanins[id] = Some(Vec::new());
            self.fanouts[id] = None;
            self.connect(self.polarity_node(s), id, false);
            self.pos.push(id);
        }

        // Remove logic that drives nothing; reverse order cascades.
        for i in (0..self.objs.len()).rev() {
            let id = self.objs[i];
            if self.is_dead(id) {
                self.remove_node(id);
            }
        }
    }

    /// Map a source edge onto the node computing its value: NAND nodes carry
    /// the complement of the source AND, so a plain edge from a gate wants
    /// the inverted twin while a complemented edge wants the direct node.
    /// Inputs and the constant are the other way around.
    fn polarity_node(&self, s: Signal) -> NodeId {
        let i = s.index();
        match self.source.obj(i) {
            Obj::Const0 | Obj::Input(_) => {
                if s.is_complement() {
                    i + self.offset
                } else {
                    i
                }
            }
            Obj::And(_, _) => {
                if s.is_complement() {
                    i
                } else {
                    i + self.offset
                }
            }
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.fanins.len()
    }

    pub fn num_pis(&self) -> usize {
        self.pis.len()
    }
    pub fn num_pos(&self) -> usize {
        self.pos.len()
    }

    pub(crate) fn is_pi(&self, id: NodeId) -> bool {
        self.fanins[id].is_none() && self.fanouts[id].is_some()
    }
    pub(crate) fn is_po(&self, id: NodeId) -> bool {
        self.fanouts[id].is_none() && self.fanins[id].is_some()
    }
    pub(crate) fn is_empty(&self, id: NodeId) -> bool {
        self.fanins[id].is_none() && self.fanouts[id].is_none()
    }
    pub(crate) fn is_dead(&self, id: NodeId) -> bool {
        matches!(&self.fanouts[id], Some(fo) if fo.is_empty())
    }
    pub(crate) fn is_empty_or_dead(&self, id: NodeId) -> bool {
        self.is_empty(id) || self.is_dead(id)
    }

    pub(crate) fn fanins(&self, id: NodeId) -> &[NodeId] {
        self.fanins[id].as_deref().unwrap_or(&[])
    }
    pub(crate) fn fanouts(&self, id: NodeId) -> &[NodeId] {
        self.fanouts[id].as_deref().unwrap_or(&[])
    }

    pub(crate) fn cfunc(&self, id: NodeId, pos: usize) -> Ref {
        match self.cfuncs[id].get(pos) {
            Some(&x) => x,
            None => self.bdd.zero(),
        }
    }
    pub(crate) fn set_cfuncs(&mut self, id: NodeId, cfuncs: Vec<Ref>) {
        self.cfuncs[id] = cfuncs;
    }

    /// Total wire count: the sum of fanin-list lengths over live nodes.
    pub fn count_wires(&self) -> usize {
        self.objs.iter().map(|&id| self.fanins(id).len()).sum()
    }

    pub fn stats(&self) -> NetStats {
        NetStats {
            gates: self.objs.len(),
            wires: self.objs.iter().map(|&id| self.fanins(id).len()).sum(),
        }
    }

    pub(crate) fn position(&self, id: NodeId) -> Option<usize> {
        self.objs.iter().position(|&x| x == id)
    }

    /// Add the edge `fanin -> fanout`. The caller guarantees the edge does
    /// not already exist. With `sort`, the processing order is repaired when
    /// the fanin currently sits after the fanout.
    pub(crate) fn connect(&mut self, fanin: NodeId, fanout: NodeId, sort: bool) {
        debug_assert!(!self.fanins(fanout).contains(&fanin));
        self.fanins[fanout]
            .as_mut()
            .expect("fanout node has a fanin list")
            .push(fanin);
        self.fanouts[fanin]
            .as_mut()
            .expect("fanin node has a fanout list")
            .push(fanout);
        if !self.cfuncs[fanout].is_empty() {
            // Keep the per-edge list aligned; zero is the conservative value.
            let zero = self.bdd.zero();
            self.cfuncs[fanout].push(zero);
        }
        if sort {
            let index_fanin = self.position(fanin);
            let index_fanout = self.position(fanout);
            if let (Some(i), Some(o)) = (index_fanin, index_fanout) {
                if o < i {
                    self.objs.remove(i);
                    self.obj_entry(fanin);
                }
            }
        }
    }

    pub(crate) fn disconnect(&mut self, fanin: NodeId, fanout: NodeId) {
        let fi = self.fanins[fanout].as_mut().expect("fanout has fanins");
        if let Some(pos) = fi.iter().position(|&x| x == fanin) {
            fi.remove(pos);
            if self.cfuncs[fanout].len() > pos {
                self.cfuncs[fanout].remove(pos);
            }
        }
        let fo = self.fanouts[fanin].as_mut().expect("fanin has fanouts");
        if let Some(pos) = fo.iter().position(|&x| x == fanout) {
            fo.remove(pos);
        }
    }

    /// Remove a node entirely, freeing its id slot for reuse.
    pub(crate) fn remove_node(&mut self, id: NodeId) {
        let fanins = self.fanins[id].take().unwrap_or_default();
        for f in fanins {
            if let Some(fo) = self.fanouts[f].as_mut() {
                fo.retain(|&x| x != id);
            }
        }
        let fanouts = self.fanouts[id].take().unwrap_or_default();
        for k in fanouts {
            if let Some(fi) = self.fanins[k].as_mut() {
                if let Some(pos) = fi.iter().position(|&x| x == id) {
                    fi.remove(pos);
                    if self.cfuncs[k].len() > pos {
                        self.cfuncs[k].remove(pos);
                    }
                }
            }
        }
        self.cfuncs[id].clear();
        if let Some(pos) = self.position(id) {
            self.objs.remove(pos);
        }
    }

    /// Splice out a node whose fanin list emptied: its function degenerated
    /// to constant-FALSE (the NAND of an empty set), so its consumers are
    /// rewired onto the constant-FALSE node instead.
    pub(crate) fn splice_to_const(&mut self, id: NodeId) {
        let consumers: Vec<NodeId> = self.fanouts(id).to_vec();
        for k in consumers {
            if !self.fanins(k).contains(&CONST0) {
                self.connect(CONST0, k, false);
            }
        }
        self.remove_node(id);
    }

    /// Insert `id` into the processing order right before its earliest
    /// fanout, pulling any misplaced fanins in front of it.
    pub(crate) fn obj_entry(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let index = self
                .fanouts(n)
                .iter()
                .filter_map(|&k| self.position(k))
                .min()
                .unwrap_or(self.objs.len());
            self.objs.insert(index, n);
            for f in self.fanins(n).to_vec() {
                if let Some(pf) = self.position(f) {
                    if pf > index {
                        self.objs.remove(pf);
                        stack.push(f);
                    }
                }
            }
        }
    }

    // -- traversal tokens ---------------------------------------------------

    /// Start a fresh traversal; previously set marks become stale at once.
    pub(crate) fn fresh_token(&mut self) -> u64 {
        self.token += 1;
        self.token
    }

    /// Reserve `n` consecutive traversal tokens and return the base.
    pub(crate) fn fresh_tokens(&mut self, n: u64) -> u64 {
        let base = self.token + 1;
        self.token += n;
        base
    }

    pub(crate) fn set_mark(&mut self, id: NodeId, token: u64) {
        self.mark[id] = token;
    }

    pub(crate) fn mark_of(&self, id: NodeId) -> u64 {
        self.mark[id]
    }

    pub(crate) fn is_marked(&self, id: NodeId, token: u64) -> bool {
        self.mark[id] == token
    }

    fn children(&self, side: Side, id: NodeId) -> &[NodeId] {
        match side {
            Side::Fanins => self.fanins(id),
            Side::Fanouts => self.fanouts(id),
        }
    }

    fn is_leaf(&self, side: Side, id: NodeId) -> bool {
        match side {
            Side::Fanins => self.fanins[id].is_none(),
            Side::Fanouts => self.fanouts[id].is_none(),
        }
    }

    /// Mark every transitive descendant of `id` on the given side with
    /// `token` (the starting node itself is not marked).
    pub(crate) fn mark_descendants(&mut self, side: Side, id: NodeId, token: u64) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            for i in 0..self.children(side, n).len() {
                let c = self.children(side, n)[i];
                if !self.is_marked(c, token) && !self.is_leaf(side, c) {
                    self.set_mark(c, token);
                    stack.push(c);
                }
            }
        }
    }

    /// Collect the transitive descendants of `id` on the given side, ordered
    /// consistently with the processing order.
    pub(crate) fn descendant_list(&mut self, side: Side, id: NodeId) -> Vec<NodeId> {
        let token = self.fresh_token();
        self.mark_descendants(side, id, token);
        self.objs
            .iter()
            .copied()
            .filter(|&n| self.is_marked(n, token))
            .collect()
    }

    // -- ranking ------------------------------------------------------------

    /// Rank for the fanin-ordering heuristic: fanout count, primary inputs
    /// pushed to the maximum.
    pub(crate) fn rank_all(&mut self) {
        for i in 0..self.capacity() {
            if self.is_empty(i) {
                continue;
            }
            self.rank[i] = if self.is_pi(i) {
                1 << 30
            } else {
                self.fanouts(i).len() as u32
            };
        }
    }

    pub(crate) fn sort_fanins(&mut self, id: NodeId) {
        let rank = &self.rank;
        if let Some(fi) = self.fanins[id].as_mut() {
            fi.sort_by_key(|&f| rank[f]);
        }
    }

    pub(crate) fn sort_fanins_all(&mut self) {
        for i in 0..self.objs.len() {
            let id = self.objs[i];
            self.sort_fanins(id);
        }
    }

    // -- diagram maintenance -------------------------------------------------

    /// Recompute the function of one node as the NAND of its fanins.
    pub(crate) fn build(&mut self, id: NodeId) -> Result<(), Overflow> {
        let mut x = self.bdd.one();
        for &f in self.fanins(id) {
            x = self.bdd.apply_and(x, self.func[f]);
        }
        self.func[id] = (-x).checked()?;
        Ok(())
    }

    pub(crate) fn build_all(&mut self) -> Result<(), Overflow> {
        for i in 0..self.objs.len() {
            let id = self.objs[i];
            self.build(id)?;
        }
        Ok(())
    }

    /// Rebuild `start` and everything downstream of it.
    pub(crate) fn build_cone(&mut self, start: NodeId) -> Result<(), Overflow> {
        self.build(start)?;
        let targets = self.descendant_list(Side::Fanouts, start);
        for id in targets {
            self.build(id)?;
        }
        Ok(())
    }

    fn build_inverted(&mut self, id: NodeId, start: NodeId) -> Result<(), Overflow> {
        let mut x = self.bdd.one();
        for &f in self.fanins(id) {
            let v = if f == start {
                -self.func[f]
            } else {
                self.func[f]
            };
            x = self.bdd.apply_and(x, v);
        }
        self.func[id] = (-x).checked()?;
        Ok(())
    }

    /// Rebuild the strict fanout cone of `start` as if `start`'s output were
    /// inverted; `start`'s own function is left untouched.
    pub(crate) fn build_cone_inverted(&mut self, start: NodeId) -> Result<(), Overflow> {
        let targets = self.descendant_list(Side::Fanouts, start);
        for id in targets {
            self.build_inverted(id, start)?;
        }
        Ok(())
    }

    // -- external don't-cares ------------------------------------------------

    pub fn attach_dc(&mut self, po_index: usize, graph: Aig) {
        self.dc[po_index].push(graph);
    }

    /// Evaluate one output of an external graph into the diagram manager.
    pub(crate) fn bdd_of_output(&self, graph: &Aig, po: usize) -> Result<Ref, Overflow> {
        assert!(graph.num_inputs() <= self.bdd.num_vars());
        let mut val = vec![Ref::INVALID; graph.num_objs()];
        for i in 0..graph.num_objs() {
            val[i] = match graph.obj(i) {
                Obj::Const0 => self.bdd.zero(),
                Obj::Input(k) => self.bdd.ith_var(k),
                Obj::And(a, b) => {
                    let x = Self::signed(&val, a);
                    let y = Self::signed(&val, b);
                    self.bdd.apply_and(x, y).checked()?
                }
            };
        }
        let s = graph.output(po);
        Ok(Self::signed(&val, s))
    }

    fn signed(val: &[Ref], s: Signal) -> Ref {
        if s.is_complement() {
            -val[s.index()]
        } else {
            val[s.index()]
        }
    }

    /// Fold the attached external don't-care graphs into the per-output G
    /// functions. Must run right after (re)allocating the manager.
    pub(crate) fn compose_dc(&mut self) -> Result<(), Overflow> {
        let zero = self.bdd.zero();
        for i in 0..self.pos.len() {
            self.gfunc[self.pos[i]] = zero;
        }
        for i in 0..self.pos.len() {
            if self.dc[i].is_empty() {
                continue;
            }
            let mut x = self.bdd.one();
            for g in &self.dc[i] {
                let d = self.bdd_of_output(g, 0)?;
                x = self.bdd.apply_and(x, d).checked()?;
                if self.bdd.is_zero(x) {
                    break;
                }
            }
            self.gfunc[self.pos[i]] = x;
        }
        Ok(())
    }

    // -- verification & export ----------------------------------------------

    /// The explicit consistency pass: adjacency mirror consistency, duplicate
    /// edges, and function = NAND(fanins) for every live node. Not run
    /// automatically; intended for tests and debugging.
    pub fn check(&self) -> bool {
        let mut ok = true;
        for &id in self.objs.iter().chain(self.pos.iter()) {
            let fanins = self.fanins(id);
            for (i, &f) in fanins.iter().enumerate() {
                if fanins[i + 1..].contains(&f) {
                    error!("duplicate edge {} -> {}", f, id);
                    ok = false;
                }
                if !self.fanouts[f]
                    .as_deref()
                    .map_or(false, |fo| fo.contains(&id))
                {
                    error!("missing mirror fanout {} -> {}", f, id);
                    ok = false;
                }
            }
            for &k in self.fanouts(id) {
                if !self.fanins[k]
                    .as_deref()
                    .map_or(false, |fi| fi.contains(&id))
                {
                    error!("missing mirror fanin {} -> {}", id, k);
                    ok = false;
                }
            }
        }
        for &id in &self.objs {
            if !self.func[id].is_valid() {
                continue;
            }
            let mut x = self.bdd.one();
            for &f in self.fanins(id) {
                x = self.bdd.apply_and(x, self.func[f]);
            }
            if x.is_valid() && self.func[id] != -x {
                error!("function mismatch at {}: {} != {}", id, self.func[id], -x);
                ok = false;
            }
        }
        ok
    }

    /// Emit the network into `dst`, with `input_values` supplying the signal
    /// of each primary input; returns the signals of the primary outputs.
    pub(crate) fn emit(&self, dst: &mut Aig, input_values: &[Signal]) -> Vec<Signal> {
        assert_eq!(input_values.len(), self.pis.len());
        let mut val = vec![Signal::zero(); self.capacity()];
        for (i, &pi) in self.pis.iter().enumerate() {
            val[pi] = input_values[i];
        }
        for &id in &self.objs {
            let mut x = Signal::one();
            for &f in self.fanins(id) {
                x = dst.and(x, val[f]);
            }
            val[id] = !x;
        }
        self.pos
            .iter()
            .map(|&po| val[self.fanins(po)[0]])
            .collect()
    }

    /// Export the (single-window) network as a fresh source graph.
    pub fn export(&self) -> Aig {
        let mut dst = Aig::new();
        let inputs: Vec<Signal> = (0..self.pis.len()).map(|_| dst.add_input()).collect();
        let outs = self.emit(&mut dst, &inputs);
        for s in outs {
            dst.add_output(s);
        }
        dst.cleanup()
    }

    /// Dump the network as a BLIF netlist, for debugging.
    pub fn to_blif(&self, w: &mut impl Write) -> std::io::Result<()> {
        writeln!(w, ".model net")?;
        write!(w, ".inputs")?;
        for i in 0..self.pis.len() {
            write!(w, " pi{}", i)?;
        }
        writeln!(w)?;
        write!(w, ".outputs")?;
        for i in 0..self.pos.len() {
            write!(w, " po{}", i)?;
        }
        writeln!(w)?;
        writeln!(w, ".names const0\n0")?;
        let name = |id: NodeId| -> String {
            if id == CONST0 {
                "const0".to_string()
            } else if let Some(i) = self.pis.iter().position(|&p| p == id) {
                format!("pi{}", i)
            } else {
                format!("n{}", id)
            }
        };
        for &id in &self.objs {
            write!(w, ".names")?;
            for &f in self.fanins(id) {
                write!(w, " {}", name(f))?;
            }
            writeln!(w, " n{}", id)?;
            writeln!(w, "{} 0", "1".repeat(self.fanins(id).len()))?;
        }
        for (i, &po) in self.pos.iter().enumerate() {
            writeln!(w, ".names {} po{}", name(self.fanins(po)[0]), i)?;
            writeln!(w, "1 1")?;
        }
        writeln!(w, ".end")
    }

    /// Find the next empty id slot at or after `from`.
    pub(crate) fn next_empty_slot(&self, from: NodeId) -> Option<NodeId> {
        (from.max(1)..self.capacity()).find(|&id| self.is_empty(id))
    }

    /// Claim an empty slot as a fresh internal node with no edges yet.
    pub(crate) fn alloc_node(&mut self, id: NodeId) {
        assert!(self.is_empty(id));
        self.fanins[id] = Some(Vec::new());
        self.fanouts[id] = Some(Vec::new());
        self.func[id] = Ref::INVALID;
        self.gfunc[id] = self.bdd.zero();
        self.cfuncs[id].clear();
    }

    pub(crate) fn rank_value(&self, id: NodeId) -> u32 {
        self.rank[id]
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::opt::PfMode;

    fn and_or_source() -> Aig {
        // out = (a & b) | (c & d)
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

    fn bits(n: usize, k: usize) -> Vec<bool> {
        (0..n).map(|i| (k >> i) & 1 != 0).collect()
    }

    #[test]
    fn test_construction_invariants() {
        let source = and_or_source();
        let net = Network::from_aig(source, 10, PfMode::Cspf, None);
        assert!(net.check());
        assert_eq!(net.num_pis(), 4);
        assert_eq!(net.num_pos(), 1);
        // Every live internal node is a NAND with at least one fanin.
        for &id in &net.objs {
            assert!(!net.fanins(id).is_empty());
        }
    }

    #[test]
    fn test_construction_round_trip() {
        let source = and_or_source();
        let net = Network::from_aig(source.clone(), 10, PfMode::Cspf, None);
        let exported = net.export();
        for k in 0..16 {
            let v = bits(4, k);
            assert_eq!(source.eval(&v), exported.eval(&v));
        }
    }

    #[test]
    fn test_build_all_functions() {
        let source = and_or_source();
        let mut net = Network::from_aig(source, 10, PfMode::Cspf, None);
        net.build_all().unwrap();
        assert!(net.check());
        // The PO driver's function equals (a & b) | (c & d).
        let po_driver = net.fanins(net.pos[0])[0];
        let a = net.bdd.ith_var(0);
        let b = net.bdd.ith_var(1);
        let c = net.bdd.ith_var(2);
        let d = net.bdd.ith_var(3);
        let ab = net.bdd.apply_and(a, b);
        let cd = net.bdd.apply_and(c, d);
        let expected = net.bdd.apply_or(ab, cd);
        assert_eq!(net.func[po_driver], expected);
    }

    #[test]
    fn test_connect_disconnect_mirror() {
        let source = and_or_source();
        let mut net = Network::from_aig(source, 10, PfMode::Cspf, None);
        let v = net.objs[net.objs.len() - 1];
        let pi = net.pis[3];
        if !net.fanins(v).contains(&pi) {
            net.connect(pi, v, true);
            assert!(net.check());
            net.disconnect(pi, v);
        }
        assert!(net.check());
    }

    #[test]
    fn test_splice_to_const() {
        let source = and_or_source();
        let mut net = Network::from_aig(source, 10, PfMode::Cspf, None);
        // Pick an internal node with consumers and splice it out.
        let id = *net
            .objs
            .iter()
            .find(|&&id| !net.fanouts(id).is_empty() && !net.is_po(id))
            .unwrap();
        let consumers: Vec<_> = net.fanouts(id).to_vec();
        for &f in net.fanins(id).to_vec().iter() {
            net.disconnect(f, id);
        }
        net.splice_to_const(id);
        assert!(net.is_empty(id));
        for k in consumers {
            assert!(net.fanins(k).contains(&CONST0));
        }
        assert!(net.check());
    }

    #[test]
    fn test_descendant_list_is_ordered() {
        let source = and_or_source();
        let mut net = Network::from_aig(source, 10, PfMode::Cspf, None);
        let first = net.objs[0];
        let list = net.descendant_list(Side::Fanouts, first);
        // Positions in the processing order must be increasing.
        let positions: Vec<_> = list.iter().map(|&id| net.position(id).unwrap()).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_to_blif_smoke() {
        let source = and_or_source();
        let net = Network::from_aig(source, 10, PfMode::Cspf, None);
        let mut buf = Vec::new();
        net.to_blif(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with(".model"));
        assert!(text.contains(".inputs pi0 pi1 pi2 pi3"));
        assert!(text.trim_end().ends_with(".end"));
    }
}
