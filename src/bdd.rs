use std::cell::RefCell;
use std::fmt::Debug;

use log::debug;

use crate::cache::Cache;
use crate::reference::Ref;
use crate::table::Table;
use crate::utils::{pairing3, PerfectHash};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Node {
    /// Level of the node in the (frozen) variable order, 1-indexed.
    level: u32,
    low: Ref,
    high: Ref,
}

#[allow(clippy::derivable_impls)]
impl Default for Node {
    fn default() -> Self {
        Self {
            level: 0,
            low: Ref::INVALID,
            high: Ref::INVALID,
        }
    }
}

impl PerfectHash for Node {
    fn hash(&self) -> u64 {
        pairing3(
            self.level as u64,
            self.low.unsigned() as u64,
            self.high.unsigned() as u64,
        )
    }
}

type Storage = Table<Node>;

/// Capacity exhaustion of the diagram manager.
///
/// This is the only error the engine propagates: it means a producing
/// operation returned [`Ref::INVALID`] because the node table is full. It is
/// always recoverable by the refresh path, never by the reporting call site.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Overflow;

impl Ref {
    /// Promote the invalid sentinel into the typed overflow error.
    pub fn checked(self) -> Result<Self, Overflow> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Overflow)
        }
    }
}

/// The diagram manager: canonical Boolean function algebra over a bounded
/// node table.
///
/// All operations go through the manager and return [`Ref`] handles. Once the
/// table fills up, producing operations return [`Ref::INVALID`] instead of
/// aborting; callers route that through the refresh protocol. The variable
/// order is frozen at allocation time.
pub struct Bdd {
    storage: RefCell<Storage>,
    cache: RefCell<Cache<(Ref, Ref, Ref), Ref>>,
    /// `order[v]` is the 1-indexed level of variable `v`.
    order: Vec<u32>,
    vars: Vec<Ref>,
    zero: Ref,
    one: Ref,
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("Bdd")
            .field("capacity", &storage.capacity())
            .field("num_vars", &self.vars.len())
            .field("num_nodes", &storage.real_size())
            .finish()
    }
}

impl Bdd {
    /// Allocate a manager with `num_vars` variables and `2^bits` node
    /// capacity, optionally seeded with a frozen variable order
    /// (`order[v]` = 0-indexed level of variable `v`).
    ///
    /// # Panics
    ///
    /// Panics if the capacity cannot even hold the terminal and one node per
    /// variable, or if `order` is not a permutation of `0..num_vars`.
    pub fn new(num_vars: usize, bits: usize, order: Option<&[u32]>) -> Self {
        assert!(bits <= 31, "Capacity bits should be in the range 0..=31");
        assert!(
            (1 << bits) > num_vars + 1,
            "Capacity 2^{} cannot hold {} variables",
            bits,
            num_vars
        );

        let cache_bits = bits.min(16);
        let mut storage = Storage::new(bits);

        // Allocate the terminal node:
        let one = storage.alloc().expect("capacity checked above");
        assert_eq!(one, 1);
        let one = Ref::positive(one as u32);
        let zero = -one;

        let order: Vec<u32> = match order {
            Some(order) => {
                assert_eq!(order.len(), num_vars);
                let mut seen = vec![false; num_vars];
                for &level in order {
                    assert!(
                        (level as usize) < num_vars && !seen[level as usize],
                        "Variable order is not a permutation"
                    );
                    seen[level as usize] = true;
                }
                order.iter().map(|&level| level + 1).collect()
            }
            None => (1..=num_vars as u32).collect(),
        };

        let mut bdd = Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(cache_bits)),
            order,
            vars: Vec::with_capacity(num_vars),
            zero,
            one,
        };

        for v in 0..num_vars {
            let level = bdd.order[v];
            let var = bdd.mk_node(level, zero, one);
            assert!(var.is_valid(), "capacity checked above");
            bdd.vars.push(var);
        }

        bdd
    }

    pub fn zero(&self) -> Ref {
        self.zero
    }
    pub fn one(&self) -> Ref {
        self.one
    }

    /// The literal of the `i`-th input variable (0-indexed).
    pub fn ith_var(&self, i: usize) -> Ref {
        self.vars[i]
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// The frozen variable order, as 0-indexed levels per variable.
    pub fn order(&self) -> Vec<u32> {
        self.order.iter().map(|&level| level - 1).collect()
    }

    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().real_size()
    }

    pub fn capacity(&self) -> usize {
        self.storage.borrow().capacity()
    }

    /// True when the live node count exceeds half the capacity; the cue for
    /// pre-emptive growth.
    pub fn is_loaded(&self) -> bool {
        self.num_nodes() * 2 > self.capacity()
    }

    /// Double the node capacity in place. All handles stay valid.
    pub fn grow(&mut self) {
        self.storage.borrow_mut().grow();
    }

    fn level(&self, index: usize) -> u32 {
        self.storage.borrow().value(index).level
    }
    fn low(&self, index: usize) -> Ref {
        self.storage.borrow().value(index).low
    }
    fn high(&self, index: usize) -> Ref {
        self.storage.borrow().value(index).high
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        self.is_zero(node) || self.is_one(node)
    }

    /// The tautology test: does `node` denote the constant-TRUE function?
    pub fn is_tautology(&self, node: Ref) -> bool {
        self.is_one(node)
    }

    fn mk_node(&self, level: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(level, 0, "Level should not be zero");

        if !low.is_valid() || !high.is_valid() {
            return Ref::INVALID;
        }

        // Canonicity: the high edge is never complemented.
        if high.is_negated() {
            return -self.mk_node(level, -low, -high);
        }

        // Redundant test.
        if low == high {
            return low;
        }

        match self.storage.borrow_mut().put(Node { level, low, high }) {
            Some(i) => Ref::positive(i as u32),
            None => {
                debug!("mk_node: node table is full");
                Ref::INVALID
            }
        }
    }

    fn top_cofactors(&self, node: Ref, level: u32) -> (Ref, Ref) {
        assert_ne!(level, 0, "Level should not be zero");

        let i = node.index();
        if self.is_terminal(node) || level < self.level(i) {
            return (node, node);
        }
        assert_eq!(level, self.level(i));
        if node.is_negated() {
            (-self.low(i), -self.high(i))
        } else {
            (self.low(i), self.high(i))
        }
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(x, y, z) = (x ∧ y) ∨ (¬x ∧ z)
    /// ```
    ///
    /// Returns [`Ref::INVALID`] if any argument is invalid or the node table
    /// fills up mid-computation.
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        if !f.is_valid() || !g.is_valid() || !h.is_valid() {
            return Ref::INVALID;
        }

        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // From now on, F is known not to be a constant.
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,~F) => ite(F,G,1)
        let (mut f, mut g, mut h) = (f, g, h);
        if g == f {
            g = self.one;
        } else if g == -f {
            g = self.zero;
        }
        if h == f {
            h = self.zero;
        } else if h == -f {
            h = self.one;
        }
        if g == h {
            return g;
        }

        // ite(F,1,H) == F ∨ H and ite(F,G,0) == F ∧ G are commutative:
        // order the operands to improve cache hit rate.
        if self.is_one(g) && !self.is_terminal(h) && h.index() < f.index() {
            std::mem::swap(&mut f, &mut h);
        }
        if self.is_zero(h) && !self.is_terminal(g) && g.index() < f.index() {
            std::mem::swap(&mut f, &mut g);
        }

        // ite(~F,G,H) => ite(F,H,G)
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }

        // ite(F,~G,H) => ~ite(F,G,~H)
        let mut n = false;
        if g.is_negated() {
            n = true;
            g = -g;
            h = -h;
        }

        let (f, g, h) = (f, g, h); // make immutable

        let key = (f, g, h);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return if n { -res } else { res };
        }

        // Determine the top level:
        let i = self.level(f.index());
        let j = self.level(g.index());
        let k = self.level(h.index());
        let mut m = i;
        if j != 0 {
            m = m.min(j);
        }
        if k != 0 {
            m = m.min(k);
        }
        assert_ne!(m, 0);

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.apply_ite(f0, g0, h0);
        if !e.is_valid() {
            return Ref::INVALID;
        }
        let t = self.apply_ite(f1, g1, h1);
        if !t.is_valid() {
            return Ref::INVALID;
        }

        let res = self.mk_node(m, e, t);
        if !res.is_valid() {
            return Ref::INVALID;
        }
        self.cache.borrow_mut().insert(&key, res);

        if n {
            -res
        } else {
            res
        }
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_xnor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    /// Express a function as a small source graph over this manager's
    /// variables, one multiplexer per diagram node.
    pub fn to_aig(&self, f: Ref) -> crate::aig::Aig {
        use crate::aig::{Aig, Signal};
        use std::collections::HashMap;

        assert!(f.is_valid());
        let mut dst = Aig::new();
        let inputs: Vec<Signal> = (0..self.num_vars()).map(|_| dst.add_input()).collect();
        let mut var_at_level = vec![0usize; self.num_vars() + 1];
        for (v, &level) in self.order.iter().enumerate() {
            var_at_level[level as usize] = v;
        }

        let mut memo: HashMap<usize, Signal> = HashMap::new();
        memo.insert(self.one.index(), Signal::one());

        fn walk(
            bdd: &Bdd,
            idx: usize,
            dst: &mut crate::aig::Aig,
            inputs: &[Signal],
            var_at_level: &[usize],
            memo: &mut HashMap<usize, Signal>,
        ) -> Signal {
            if let Some(&s) = memo.get(&idx) {
                return s;
            }
            let low = bdd.low(idx);
            let high = bdd.high(idx);
            let low_s = {
                let s = walk(bdd, low.index(), dst, inputs, var_at_level, memo);
                if low.is_negated() {
                    !s
                } else {
                    s
                }
            };
            let high_s = {
                let s = walk(bdd, high.index(), dst, inputs, var_at_level, memo);
                if high.is_negated() {
                    !s
                } else {
                    s
                }
            };
            let v = inputs[var_at_level[bdd.level(idx) as usize]];
            let t = dst.and(v, high_s);
            let e = dst.and(!v, low_s);
            let s = dst.or(t, e);
            memo.insert(idx, s);
            s
        }

        let s = walk(self, f.index(), &mut dst, &inputs, &var_at_level, &mut memo);
        let s = if f.is_negated() { !s } else { s };
        dst.add_output(s);
        dst
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_var() {
        let bdd = Bdd::new(3, 10, None);

        let x = bdd.ith_var(0);
        assert_eq!(bdd.level(x.index()), 1);
        assert_eq!(bdd.high(x.index()), bdd.one());
        assert_eq!(bdd.low(x.index()), bdd.zero());
    }

    #[test]
    fn test_de_morgan() {
        let bdd = Bdd::new(2, 10, None);

        let x = bdd.ith_var(0);
        let y = bdd.ith_var(1);

        assert_eq!(-bdd.apply_and(x, y), bdd.apply_or(-x, -y));
        assert_eq!(-bdd.apply_or(x, y), bdd.apply_and(-x, -y));
    }

    #[test]
    fn test_xor_xnor() {
        let bdd = Bdd::new(2, 10, None);

        let x = bdd.ith_var(0);
        let y = bdd.ith_var(1);

        let f = bdd.apply_xor(x, y);
        assert_eq!(-f, bdd.apply_xnor(x, y));
        assert!(bdd.is_zero(bdd.apply_xor(f, f)));
        assert!(bdd.is_one(bdd.apply_xnor(f, f)));
    }

    #[test]
    fn test_tautology() {
        let bdd = Bdd::new(2, 10, None);

        let x = bdd.ith_var(0);
        let y = bdd.ith_var(1);

        assert!(bdd.is_tautology(bdd.apply_or(x, -x)));
        assert!(!bdd.is_tautology(bdd.apply_or(x, y)));
    }

    #[test]
    fn test_apply_ite() {
        let bdd = Bdd::new(4, 10, None);

        let f = bdd.ith_var(0);
        let g = bdd.ith_var(1);
        let h = bdd.ith_var(2);

        assert_eq!(bdd.apply_ite(bdd.one(), g, h), g);
        assert_eq!(bdd.apply_ite(bdd.zero(), g, h), h);
        assert_eq!(bdd.apply_ite(f, g, g), g);
        assert_eq!(bdd.apply_ite(f, bdd.one(), bdd.zero()), f);
        assert_eq!(bdd.apply_ite(f, bdd.zero(), bdd.one()), -f);
        assert_eq!(bdd.apply_ite(f, f, h), bdd.apply_or(f, h));
        assert_eq!(bdd.apply_ite(f, g, f), bdd.apply_and(f, g));

        let x_and_y = bdd.apply_and(f, g);
        let not_x_and_z = bdd.apply_and(-f, h);
        assert_eq!(bdd.apply_ite(f, g, h), bdd.apply_or(x_and_y, not_x_and_z));
    }

    #[test]
    fn test_overflow_returns_invalid() {
        // 2^3 = 8 cells: sentry + terminal + 2 vars leave almost no room.
        let bdd = Bdd::new(2, 3, None);

        let x = bdd.ith_var(0);
        let y = bdd.ith_var(1);

        let mut f = bdd.apply_xor(x, y);
        // Keep combining until the table fills; the result must degrade to
        // the invalid sentinel, never panic.
        for _ in 0..8 {
            f = bdd.apply_xor(f, bdd.apply_and(x, f));
        }
        let g = bdd.apply_and(f, bdd.apply_or(x, y));
        let _ = g; // either valid or invalid; no abort is the property
    }

    #[test]
    fn test_invalid_absorbs() {
        let bdd = Bdd::new(2, 10, None);
        let x = bdd.ith_var(0);

        assert!(!bdd.apply_and(Ref::INVALID, x).is_valid());
        assert!(!bdd.apply_or(x, Ref::INVALID).is_valid());
        assert!(!bdd.apply_xnor(Ref::INVALID, Ref::INVALID).is_valid());
        assert_eq!(Ref::INVALID.checked(), Err(Overflow));
        assert_eq!(x.checked(), Ok(x));
    }

    #[test]
    fn test_frozen_order() {
        let bdd = Bdd::new(3, 10, Some(&[2, 0, 1]));

        assert_eq!(bdd.order(), vec![2, 0, 1]);
        // Variable 1 sits at the topmost level.
        assert_eq!(bdd.level(bdd.ith_var(1).index()), 1);
        assert_eq!(bdd.level(bdd.ith_var(2).index()), 2);
        assert_eq!(bdd.level(bdd.ith_var(0).index()), 3);
    }

    #[test]
    fn test_grow_preserves_handles() {
        let bdd = Bdd::new(2, 3, None);
        let x = bdd.ith_var(0);
        let y = bdd.ith_var(1);

        let mut bdd = bdd;
        let f = bdd.apply_and(x, y);
        bdd.grow();
        assert_eq!(bdd.capacity(), 16);
        assert_eq!(bdd.apply_and(x, y), f);
    }
}
