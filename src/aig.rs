use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Not;

/// An edge in the source graph: object index plus complement bit.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Signal(u32);

impl Signal {
    /// The constant-FALSE object, non-complemented.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// The constant-TRUE edge (complemented constant-FALSE).
    pub const fn one() -> Self {
        Self(1)
    }

    pub const fn from_index(index: usize) -> Self {
        Self((index as u32) << 1)
    }

    pub const fn index(self) -> usize {
        (self.0 >> 1) as usize
    }

    pub const fn is_complement(self) -> bool {
        self.0 & 1 != 0
    }

    pub const fn is_const(self) -> bool {
        self.index() == 0
    }

    fn with_complement(self, c: bool) -> Self {
        Self(self.0 & !1 | c as u32)
    }
}

impl Not for Signal {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(self.0 ^ 1)
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_complement() {
            write!(f, "!")?;
        }
        write!(f, "s{}", self.index())
    }
}

impl Debug for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Obj {
    Const0,
    /// Primary input, holding its position in the input list.
    Input(usize),
    /// Two-input AND of two (possibly complemented) edges.
    And(Signal, Signal),
}

/// An and-inverter source graph.
///
/// Object 0 is the constant-FALSE; objects are stored in topological order.
/// AND objects are hash-consed, so structurally identical gates share one
/// object. This is the external representation networks are built from and
/// exported to, and the carrier for window extraction and don't-care
/// composition.
#[derive(Debug, Clone)]
pub struct Aig {
    objs: Vec<Obj>,
    inputs: Vec<usize>,
    outputs: Vec<Signal>,
    strash: HashMap<(u32, u32), usize>,
}

impl Aig {
    pub fn new() -> Self {
        Self {
            objs: vec![Obj::Const0],
            inputs: Vec::new(),
            outputs: Vec::new(),
            strash: HashMap::new(),
        }
    }

    pub fn num_objs(&self) -> usize {
        self.objs.len()
    }
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
    pub fn num_ands(&self) -> usize {
        self.objs
            .iter()
            .filter(|o| matches!(o, Obj::And(_, _)))
            .count()
    }

    pub fn obj(&self, index: usize) -> Obj {
        self.objs[index]
    }

    /// The signal of the `i`-th primary input.
    pub fn input(&self, i: usize) -> Signal {
        Signal::from_index(self.inputs[i])
    }

    /// The object index of the `i`-th primary input.
    pub fn input_index(&self, i: usize) -> usize {
        self.inputs[i]
    }

    pub fn output(&self, i: usize) -> Signal {
        self.outputs[i]
    }

    pub fn outputs(&self) -> &[Signal] {
        &self.outputs
    }

    pub fn add_input(&mut self) -> Signal {
        let index = self.objs.len();
        self.objs.push(Obj::Input(self.inputs.len()));
        self.inputs.push(index);
        Signal::from_index(index)
    }

    pub fn add_output(&mut self, signal: Signal) {
        debug_assert!(signal.index() < self.objs.len());
        self.outputs.push(signal);
    }

    /// Build the AND of two edges, hash-consed, with the trivial cases
    /// folded away.
    pub fn and(&mut self, a: Signal, b: Signal) -> Signal {
        if a == b {
            return a;
        }
        if a == !b || a == Signal::zero() || b == Signal::zero() {
            return Signal::zero();
        }
        if a == Signal::one() {
            return b;
        }
        if b == Signal::one() {
            return a;
        }
        let (a, b) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        if let Some(&index) = self.strash.get(&(a.0, b.0)) {
            return Signal::from_index(index);
        }
        let index = self.objs.len();
        self.objs.push(Obj::And(a, b));
        self.strash.insert((a.0, b.0), index);
        Signal::from_index(index)
    }

    pub fn or(&mut self, a: Signal, b: Signal) -> Signal {
        !self.and(!a, !b)
    }

    /// Evaluate all outputs under the given input assignment.
    pub fn eval(&self, values: &[bool]) -> Vec<bool> {
        assert_eq!(values.len(), self.num_inputs());
        let mut val = vec![false; self.objs.len()];
        for (i, obj) in self.objs.iter().enumerate() {
            val[i] = match *obj {
                Obj::Const0 => false,
                Obj::Input(k) => values[k],
                Obj::And(a, b) => {
                    (val[a.index()] ^ a.is_complement()) && (val[b.index()] ^ b.is_complement())
                }
            };
        }
        self.outputs
            .iter()
            .map(|s| val[s.index()] ^ s.is_complement())
            .collect()
    }

    fn map(copy: &[Signal], s: Signal) -> Signal {
        let t = copy[s.index()];
        t.with_complement(t.is_complement() ^ s.is_complement())
    }

    /// Copy every object into `dst` under the partially prefilled `copy` map
    /// (entries for inputs and the constant must already be set).
    fn lift_ands(&self, dst: &mut Aig, copy: &mut [Signal]) {
        for (i, obj) in self.objs.iter().enumerate() {
            if let Obj::And(a, b) = *obj {
                let a = Self::map(copy, a);
                let b = Self::map(copy, b);
                copy[i] = dst.and(a, b);
            }
        }
    }

    fn fresh_copy_map(&self, dst: &mut Aig) -> Vec<Signal> {
        let mut copy = vec![Signal::zero(); self.objs.len()];
        for &i in &self.inputs {
            copy[i] = dst.add_input();
        }
        copy
    }

    /// Structural duplicate with re-hashing.
    pub fn dup(&self) -> Self {
        let mut dst = Aig::new();
        let mut copy = self.fresh_copy_map(&mut dst);
        self.lift_ands(&mut dst, &mut copy);
        for &o in &self.outputs {
            let s = Self::map(&copy, o);
            dst.add_output(s);
        }
        dst
    }

    /// Duplicate only the cones of the selected outputs. All inputs are kept
    /// so input indexing is preserved.
    pub fn dup_cones(&self, pos: &[usize]) -> Self {
        let mut keep = vec![false; self.objs.len()];
        let mut stack: Vec<usize> = pos.iter().map(|&i| self.outputs[i].index()).collect();
        while let Some(i) = stack.pop() {
            if keep[i] {
                continue;
            }
            keep[i] = true;
            if let Obj::And(a, b) = self.objs[i] {
                stack.push(a.index());
                stack.push(b.index());
            }
        }

        let mut dst = Aig::new();
        let mut copy = self.fresh_copy_map(&mut dst);
        for (i, obj) in self.objs.iter().enumerate() {
            if !keep[i] {
                continue;
            }
            if let Obj::And(a, b) = *obj {
                let a = Self::map(&copy, a);
                let b = Self::map(&copy, b);
                copy[i] = dst.and(a, b);
            }
        }
        for &p in pos {
            let s = Self::map(&copy, self.outputs[p]);
            dst.add_output(s);
        }
        dst
    }

    /// Drop logic not reachable from any output; inputs are kept.
    pub fn cleanup(&self) -> Self {
        self.dup_cones(&(0..self.num_outputs()).collect::<Vec<_>>())
    }

    /// Universally quantify input `k` out of every output:
    /// `out' = out[k<-0] AND out[k<-1]`.
    pub fn forall_input(&self, k: usize) -> Self {
        let mut dst = Aig::new();
        let mut copy0 = self.fresh_copy_map(&mut dst);
        let mut copy1 = copy0.clone();
        copy0[self.inputs[k]] = Signal::zero();
        copy1[self.inputs[k]] = Signal::one();
        self.lift_ands(&mut dst, &mut copy0);
        // The second pass shares structure through the strash.
        self.lift_ands(&mut dst, &mut copy1);
        for &o in &self.outputs {
            let lo = Self::map(&copy0, o);
            let hi = Self::map(&copy1, o);
            let s = dst.and(lo, hi);
            dst.add_output(s);
        }
        dst.cleanup()
    }

    /// Stack `self` on top of `base`: input `j` of `self` is driven by output
    /// `j` of `base`. The result has `base`'s inputs and `self`'s outputs.
    pub fn stack_on(&self, base: &Aig) -> Self {
        assert!(base.num_outputs() >= self.num_inputs());
        let mut dst = Aig::new();
        let mut base_copy = base.fresh_copy_map(&mut dst);
        base.lift_ands(&mut dst, &mut base_copy);

        let mut copy = vec![Signal::zero(); self.objs.len()];
        for (j, &i) in self.inputs.iter().enumerate() {
            copy[i] = Self::map(&base_copy, base.outputs[j]);
        }
        self.lift_ands(&mut dst, &mut copy);
        for &o in &self.outputs {
            let s = Self::map(&copy, o);
            dst.add_output(s);
        }
        dst.cleanup()
    }

    /// Re-wire inputs: old input `j` is driven by new input `map[j]` of a
    /// graph with `num_inputs` inputs.
    pub fn permute_inputs(&self, map: &[usize], num_inputs: usize) -> Self {
        assert_eq!(map.len(), self.num_inputs());
        let mut dst = Aig::new();
        let fresh: Vec<Signal> = (0..num_inputs).map(|_| dst.add_input()).collect();
        let mut copy = vec![Signal::zero(); self.objs.len()];
        for (j, &i) in self.inputs.iter().enumerate() {
            copy[i] = fresh[map[j]];
        }
        self.lift_ands(&mut dst, &mut copy);
        for &o in &self.outputs {
            let s = Self::map(&copy, o);
            dst.add_output(s);
        }
        dst
    }

    /// Keep only the last `k` inputs. Earlier inputs must already be
    /// quantified out of every output cone; they are tied to constant-FALSE.
    pub fn keep_last_inputs(&self, k: usize) -> Self {
        assert!(k <= self.num_inputs());
        let first = self.num_inputs() - k;
        let mut dst = Aig::new();
        let mut copy = vec![Signal::zero(); self.objs.len()];
        for (j, &i) in self.inputs.iter().enumerate() {
            copy[i] = if j < first {
                Signal::zero()
            } else {
                dst.add_input()
            };
        }
        self.lift_ands(&mut dst, &mut copy);
        for &o in &self.outputs {
            let s = Self::map(&copy, o);
            dst.add_output(s);
        }
        dst.cleanup()
    }

    /// Extract a window: `cis` become fresh inputs (in order), `ands` is the
    /// topologically sorted object set of the window, `outs` the window's
    /// output edges (over `self`'s objects).
    pub fn extract_window(&self, cis: &[usize], ands: &[usize], outs: &[Signal]) -> Self {
        let mut dst = Aig::new();
        let mut copy = vec![Signal::zero(); self.objs.len()];
        for &i in cis {
            copy[i] = dst.add_input();
        }
        for &i in ands {
            match self.objs[i] {
                Obj::And(a, b) => {
                    let a = Self::map(&copy, a);
                    let b = Self::map(&copy, b);
                    copy[i] = dst.and(a, b);
                }
                // A window may absorb one of its own cut points.
                Obj::Input(_) | Obj::Const0 => {}
            }
        }
        for &o in outs {
            let s = Self::map(&copy, o);
            dst.add_output(s);
        }
        dst
    }

    /// Append the cones of `other`'s selected outputs onto `self`, sharing
    /// primary inputs positionally.
    pub fn append_cones(&mut self, other: &Aig, pos: &[usize]) {
        assert!(other.num_inputs() <= self.num_inputs());
        let cones = other.dup_cones(pos);
        let mut copy = vec![Signal::zero(); cones.objs.len()];
        for (j, &i) in cones.inputs.iter().enumerate() {
            copy[i] = self.input(j);
        }
        for (i, obj) in cones.objs.clone().iter().enumerate() {
            if let Obj::And(a, b) = *obj {
                let a = Self::map(&copy, a);
                let b = Self::map(&copy, b);
                copy[i] = self.and(a, b);
            }
        }
        for &o in cones.outputs.clone().iter() {
            let s = Self::map(&copy, o);
            self.add_output(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn build_and_or() -> Aig {
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
    fn test_eval() {
        let aig = build_and_or();
        for k in 0..16 {
            let v = bits(4, k);
            let expected = (v[0] && v[1]) || (v[2] && v[3]);
            assert_eq!(aig.eval(&v), vec![expected]);
        }
    }

    #[test]
    fn test_strash() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let x = aig.and(a, b);
        let y = aig.and(b, a);
        assert_eq!(x, y);
        assert_eq!(aig.and(a, a), a);
        assert_eq!(aig.and(a, !a), Signal::zero());
        assert_eq!(aig.and(a, Signal::one()), a);
        assert_eq!(aig.and(a, Signal::zero()), Signal::zero());
    }

    #[test]
    fn test_dup_equivalent() {
        let aig = build_and_or();
        let dup = aig.dup();
        assert_eq!(dup.num_inputs(), 4);
        for k in 0..16 {
            let v = bits(4, k);
            assert_eq!(aig.eval(&v), dup.eval(&v));
        }
    }

    #[test]
    fn test_forall_input() {
        // out = a | b; forall a: out' = b
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let out = aig.or(a, b);
        aig.add_output(out);

        let q = aig.forall_input(0);
        assert_eq!(q.num_inputs(), 2);
        for k in 0..4 {
            let v = bits(2, k);
            assert_eq!(q.eval(&v), vec![v[1]]);
        }
    }

    #[test]
    fn test_stack_on() {
        // base: o0 = a & b, o1 = a | b; top: out = i0 | i1
        // stacked: out = (a & b) | (a | b) = a | b
        let mut base = Aig::new();
        let a = base.add_input();
        let b = base.add_input();
        let o0 = base.and(a, b);
        let o1 = base.or(a, b);
        base.add_output(o0);
        base.add_output(o1);

        let mut top = Aig::new();
        let i0 = top.add_input();
        let i1 = top.add_input();
        let out = top.or(i0, i1);
        top.add_output(out);

        let stacked = top.stack_on(&base);
        assert_eq!(stacked.num_inputs(), 2);
        for k in 0..4 {
            let v = bits(2, k);
            assert_eq!(stacked.eval(&v), vec![v[0] || v[1]]);
        }
    }

    #[test]
    fn test_permute_and_keep_last() {
        // out = i0 & i1 over 2 inputs, re-routed into a 3-input graph
        // as out = x2 & x1.
        let mut aig = Aig::new();
        let i0 = aig.add_input();
        let i1 = aig.add_input();
        let out = aig.and(i0, i1);
        aig.add_output(out);

        let p = aig.permute_inputs(&[2, 1], 3);
        assert_eq!(p.num_inputs(), 3);
        for k in 0..8 {
            let v = bits(3, k);
            assert_eq!(p.eval(&v), vec![v[2] && v[1]]);
        }

        // Quantifying x0 away (unused) and keeping the last 2 inputs yields
        // out = x1' & x0' over the remaining ones.
        let q = p.keep_last_inputs(2);
        assert_eq!(q.num_inputs(), 2);
        for k in 0..4 {
            let v = bits(2, k);
            assert_eq!(q.eval(&v), vec![v[1] && v[0]]);
        }
    }

    #[test]
    fn test_extract_window() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let ab = aig.and(a, b);
        let abc = aig.and(ab, c);
        aig.add_output(abc);

        // Window around the top gate only, with `ab` and `c` as cut inputs.
        let win = aig.extract_window(&[ab.index(), c.index()], &[abc.index()], &[abc]);
        assert_eq!(win.num_inputs(), 2);
        assert_eq!(win.num_ands(), 1);
        for k in 0..4 {
            let v = bits(2, k);
            assert_eq!(win.eval(&v), vec![v[0] && v[1]]);
        }
    }

    #[test]
    fn test_append_cones() {
        let mut first = build_and_or();
        let second = build_and_or();
        first.append_cones(&second, &[0]);
        assert_eq!(first.num_outputs(), 2);
        for k in 0..16 {
            let v = bits(4, k);
            let out = first.eval(&v);
            assert_eq!(out[0], out[1]);
        }
    }
}
