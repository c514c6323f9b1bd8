//! Windowed partitioning for large circuits.
//!
//! A large source graph is carved into bounded-size windows, each optimized
//! as its own network with its own diagram manager, then the windows are
//! stitched back into one graph. Windows are carved output-to-input: each
//! frontier gate is taken once all of its consumers are placed, preferring
//! gates that bring the fewest new external inputs into the window. A window
//! input is recorded with the window (or external input, or constant) that
//! produces it, and that record both drives the final stitch and carries
//! cross-window don't-care conditions back to the producer.

use std::collections::HashMap;

use log::{debug, info};

use crate::aig::{Aig, Obj, Signal};
use crate::bdd::Overflow;
use crate::network::{InputSource, Network, NodeId};
use crate::opt::{Config, DcMode};
use crate::reference::Ref;

pub(crate) struct Windows {
    pub nets: Vec<Network>,
    /// Producer of each external output.
    pub po_sources: Vec<InputSource>,
    /// Complement flag of each external output edge.
    pub po_compl: Vec<bool>,
}

/// Optimize through windows: carve, optimize each (propagating don't-cares
/// to producer windows when configured), stitch.
///
/// Carving tracks remaining-consumer counts, so the graph is cleaned first:
/// dangling logic would pin its fanins' counts above zero forever.
pub(crate) fn optimize_windowed(global: &Aig, config: &Config) -> Aig {
    let global = global.cleanup();
    let mut w = split(&global, config);
    info!("partitioned into {} windows", w.nets.len());
    for i in 0..w.nets.len() {
        w.nets[i].optimize(config);
        if config.dc_mode != DcMode::Off {
            w.nets[i].cspf_eager();
            propagate_dc(&mut w.nets, i, &global, config.dc_mode);
        }
    }
    stitch(&w.nets, &w.po_sources, &w.po_compl, &global, config.external_dc)
}

fn is_and(global: &Aig, id: usize) -> bool {
    matches!(global.obj(id), Obj::And(_, _))
}

/// How many of a gate's fanins are not yet inside window `part`.
fn new_inputs(global: &Aig, parts: &[usize], part: usize, id: usize) -> usize {
    let Obj::And(a, b) = global.obj(id) else {
        unreachable!("only gates are picked");
    };
    (parts[a.index()] != part) as usize + (parts[b.index()] != part) as usize
}

/// Find a gate in `list` whose consumers are all placed and which needs
/// exactly `need` new window inputs.
fn find_gate(
    global: &Aig,
    list: &[usize],
    fanout_left: &[usize],
    parts: &[usize],
    part: usize,
    need: usize,
) -> Option<usize> {
    list.iter().position(|&id| {
        is_and(global, id) && fanout_left[id] == 0 && new_inputs(global, parts, part, id) == need
    })
}

fn push_unique(list: &mut Vec<usize>, id: usize) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// Carve the source graph into windows and build one network per window.
pub(crate) fn split(global: &Aig, config: &Config) -> Windows {
    let num_pos = if config.external_dc {
        global.num_outputs() / 2
    } else {
        global.num_outputs()
    };

    // Remaining-consumer counts per object.
    let mut fanout_left = vec![0usize; global.num_objs()];
    for i in 0..global.num_objs() {
        if let Obj::And(a, b) = global.obj(i) {
            fanout_left[a.index()] += 1;
            fanout_left[b.index()] += 1;
        }
    }
    for i in 0..global.num_outputs() {
        fanout_left[global.output(i).index()] += 1;
    }

    let mut po_compl = Vec::with_capacity(num_pos);
    let mut ext_pos = Vec::with_capacity(num_pos);
    let mut cands: Vec<usize> = Vec::new();
    for i in 0..num_pos {
        let s = global.output(i);
        po_compl.push(s.is_complement());
        ext_pos.push(s.index());
        if is_and(global, s.index()) {
            fanout_left[s.index()] -= 1;
            push_unique(&mut cands, s.index());
        }
    }
    // Don't-care cones are not windowed; release their consumer counts.
    for i in num_pos..global.num_outputs() {
        let mut stack = vec![global.output(i).index()];
        while let Some(id) = stack.pop() {
            if let Obj::And(a, b) = global.obj(id) {
                fanout_left[id] -= 1;
                if fanout_left[id] == 0 {
                    stack.push(a.index());
                    stack.push(b.index());
                }
            }
        }
    }

    let mut parts = vec![0usize; global.num_objs()];
    let mut part = 0;
    let mut nets: Vec<Network> = Vec::new();
    let mut all_wpis: Vec<Vec<usize>> = Vec::new();
    let mut all_wpos: Vec<Vec<usize>> = Vec::new();

    loop {
        part += 1;
        let mut wpis: Vec<usize> = Vec::new();
        let mut wpos: Vec<usize> = Vec::new();
        let mut wout_sigs: Vec<Signal> = Vec::new();
        let mut nodes: Vec<usize> = Vec::new();
        let mut exhausted = false;

        loop {
            let picked = (0..=2)
                .find_map(|need| {
                    find_gate(global, &wpis, &fanout_left, &parts, part, need)
                        .map(|pos| (true, pos))
                })
                .or_else(|| {
                    (0..=2).find_map(|need| {
                        find_gate(global, &cands, &fanout_left, &parts, part, need)
                            .map(|pos| (false, pos))
                    })
                });
            let id = match picked {
                Some((true, pos)) => wpis.remove(pos),
                Some((false, pos)) => cands[pos],
                None => {
                    exhausted = true;
                    break;
                }
            };
            if let Some(pos) = cands.iter().position(|&x| x == id) {
                cands.remove(pos);
                wpos.push(id);
                wout_sigs.push(Signal::from_index(id));
            }
            nodes.push(id);
            let Obj::And(a, b) = global.obj(id) else {
                unreachable!()
            };
            for s in [a, b] {
                let c = s.index();
                if is_and(global, c) {
                    fanout_left[c] -= 1;
                }
                if parts[c] != part {
                    parts[c] = part;
                    wpis.push(c);
                }
            }
            if nodes.len() >= config.window_size {
                break;
            }
        }

        if !nodes.is_empty() {
            nodes.sort_unstable();
            let win = global.extract_window(&wpis, &nodes, &wout_sigs);
            debug!(
                "window {}: {} gates, {} inputs, {} outputs",
                part,
                nodes.len(),
                wpis.len(),
                wpos.len()
            );
            let mut net = Network::from_aig(
                win,
                config.exponent,
                config.pf_mode,
                config.var_order.clone(),
            );
            net.window_inputs = Some(wpis.clone());
            nets.push(net);
            for &p in &wpis {
                push_unique(&mut cands, p);
            }
            all_wpis.push(wpis);
            all_wpos.push(wpos);
        }
        if exhausted {
            break;
        }
    }

    // Map every produced object to its producer.
    let mut source_of: HashMap<usize, InputSource> = HashMap::new();
    source_of.insert(0, InputSource::Const0);
    for i in 0..global.num_inputs() {
        source_of.insert(global.input_index(i), InputSource::External(i));
    }
    for (k, wpos) in all_wpos.iter().enumerate() {
        for (index, &id) in wpos.iter().enumerate() {
            source_of.insert(id, InputSource::Window { window: k, index });
        }
    }

    for (k, wpis) in all_wpis.iter().enumerate() {
        nets[k].input_sources = wpis
            .iter()
            .map(|id| *source_of.get(id).expect("window input has a producer"))
            .collect();
    }

    let po_sources: Vec<InputSource> = ext_pos
        .iter()
        .map(|id| *source_of.get(id).expect("output driver has a producer"))
        .collect();

    // Pin every externally visible window output: with paired-output
    // don't-cares its care cone is re-expressed over the producing window's
    // inputs, otherwise a constant-FALSE entry keeps later lifted
    // don't-cares from loosening it.
    for (i, src) in po_sources.iter().enumerate() {
        let &InputSource::Window { window, index } = src else {
            continue;
        };
        let dc = if config.external_dc {
            let wins = nets[window].window_inputs.clone().expect("windowed net");
            let base = expand_cut(global, &wins, global.outputs());
            let mut dc = base.dup_cones(&[num_pos + i]);
            for v in 0..global.num_inputs() {
                dc = dc.forall_input(v);
            }
            dc.keep_last_inputs(wins.len())
        } else {
            let mut z = Aig::new();
            for _ in 0..nets[window].num_pis() {
                z.add_input();
            }
            z.add_output(Signal::zero());
            z
        };
        nets[window].dc[index].push(dc);
    }

    Windows {
        nets,
        po_sources,
        po_compl,
    }
}

/// Duplicate `global` with the `cuts` objects replaced by fresh inputs
/// (appended after the original inputs), exposing `outs` as the outputs.
fn expand_cut(global: &Aig, cuts: &[usize], outs: &[Signal]) -> Aig {
    let mut dst = Aig::new();
    let mut copy = vec![Signal::zero(); global.num_objs()];
    for i in 0..global.num_inputs() {
        copy[global.input_index(i)] = dst.add_input();
    }
    let mut cut = vec![false; global.num_objs()];
    for &c in cuts {
        cut[c] = true;
        copy[c] = dst.add_input();
    }
    for i in 0..global.num_objs() {
        if cut[i] {
            continue;
        }
        if let Obj::And(a, b) = global.obj(i) {
            let a = map_signal(&copy, a);
            let b = map_signal(&copy, b);
            copy[i] = dst.and(a, b);
        }
    }
    for &o in outs {
        let s = map_signal(&copy, o);
        dst.add_output(s);
    }
    dst
}

fn map_signal(copy: &[Signal], s: Signal) -> Signal {
    if s.is_complement() {
        !copy[s.index()]
    } else {
        copy[s.index()]
    }
}

impl Network {
    /// The intersection of the conditions under which this node's consumers
    /// tolerate an arbitrary value: what a producing window may treat as
    /// don't-care for the signal.
    fn observability_dc(&self, id: NodeId) -> Result<Ref, Overflow> {
        let mut x = self.bdd.one();
        for i in 0..self.fanouts(id).len() {
            let k = self.fanouts(id)[i];
            let y = if self.is_po(k) {
                self.gfunc[k]
            } else {
                let pos = self
                    .fanins(k)
                    .iter()
                    .position(|&f| f == id)
                    .expect("mirror edge");
                self.cfunc(k, pos)
            };
            x = self.bdd.apply_and(x, y).checked()?;
        }
        Ok(x)
    }
}

/// After window `from` is optimized, lift the don't-care condition of each
/// of its window-fed inputs back to the producing window's output list.
pub(crate) fn propagate_dc(nets: &mut [Network], from: usize, global: &Aig, mode: DcMode) {
    let sources = nets[from].input_sources.clone();
    let mut jobs: Vec<(usize, usize, Aig)> = Vec::new();

    for (pi_idx, src) in sources.iter().enumerate() {
        let &InputSource::Window { window, index } = src else {
            continue;
        };
        let pi_node = nets[from].pis[pi_idx];
        let x = {
            let net = &mut nets[from];
            let mut first = true;
            loop {
                match net.observability_dc(pi_node) {
                    Ok(x) => break x,
                    Err(Overflow) => {
                        if !first {
                            net.grow_exponent();
                        }
                        net.refresh();
                        first = false;
                    }
                }
            }
        };
        let mut g = nets[from].bdd.to_aig(x);

        match mode {
            DcMode::Off => unreachable!("propagation is gated on the mode"),
            DcMode::Simple => {
                // Quantify the inputs unrelated to the producer, then route
                // the remaining ones over the producer's output order.
                let mut fed: Vec<usize> = Vec::new();
                for (q, s) in sources.iter().enumerate() {
                    if let InputSource::Window { window: w, .. } = *s {
                        if w == window {
                            fed.push(q);
                        }
                    }
                }
                for q in 0..sources.len() {
                    if !fed.contains(&q) {
                        g = g.forall_input(q);
                    }
                }
                let k_outs = nets[window].num_pos();
                let spare = sources.len() - fed.len();
                let mut next_spare = 0;
                let map: Vec<usize> = sources
                    .iter()
                    .map(|s| match s {
                        InputSource::Window { window: w, index } if *w == window => spare + *index,
                        _ => {
                            next_spare += 1;
                            next_spare - 1
                        }
                    })
                    .collect();
                let g2 = g.permute_inputs(&map, spare + k_outs);
                let g3 = g2.keep_last_inputs(k_outs);
                jobs.push((window, index, g3.stack_on(&nets[window].source)));
            }
            DcMode::Full => {
                // Re-derive the condition against the pre-partition graph:
                // express `from`'s inputs over global inputs plus the
                // producer's window inputs, then quantify the global ones.
                let from_wins = nets[from].window_inputs.clone().expect("windowed net");
                let to_wins = nets[window].window_inputs.clone().expect("windowed net");
                let outs: Vec<Signal> = from_wins.iter().map(|&o| Signal::from_index(o)).collect();
                let base = expand_cut(global, &to_wins, &outs);
                let mut dc = g.stack_on(&base);
                for v in 0..global.num_inputs() {
                    dc = dc.forall_input(v);
                }
                jobs.push((window, index, dc.keep_last_inputs(to_wins.len())));
            }
        }
    }

    for (window, index, dc) in jobs {
        debug!("lifting don't-care into window {} output {}", window, index);
        nets[window].dc[index].push(dc);
    }
}

/// Recombine optimized windows into one cleaned source graph.
pub(crate) fn stitch(
    nets: &[Network],
    po_sources: &[InputSource],
    po_compl: &[bool],
    global: &Aig,
    external_dc: bool,
) -> Aig {
    let mut dst = Aig::new();
    let gis: Vec<Signal> = (0..global.num_inputs()).map(|_| dst.add_input()).collect();
    let mut outs: Vec<Vec<Signal>> = vec![Vec::new(); nets.len()];

    // Later windows sit closer to the inputs; emit them first.
    for k in (0..nets.len()).rev() {
        let vals: Vec<Signal> = nets[k]
            .input_sources
            .iter()
            .map(|src| match *src {
                InputSource::Window { window, index } => outs[window][index],
                InputSource::External(i) => gis[i],
                InputSource::Const0 => Signal::zero(),
            })
            .collect();
        outs[k] = nets[k].emit(&mut dst, &vals);
    }

    for (src, &compl) in po_sources.iter().zip(po_compl) {
        let s = match *src {
            InputSource::Window { window, index } => outs[window][index],
            InputSource::External(i) => gis[i],
            InputSource::Const0 => Signal::zero(),
        };
        dst.add_output(if compl { !s } else { s });
    }

    let mut out = dst.cleanup();
    if external_dc {
        let num_pos = po_sources.len();
        let dc_pos: Vec<usize> = (num_pos..global.num_outputs()).collect();
        out.append_cones(global, &dc_pos);
    }
    out
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    use super::*;
    use crate::opt::{minimize, Config};

    fn bits(n: usize, k: usize) -> Vec<bool> {
        (0..n).map(|i| (k >> i) & 1 != 0).collect()
    }

    fn random_source(seed: u64, inputs: usize, gates: usize, outputs: usize) -> Aig {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut aig = Aig::new();
        let mut pool: Vec<Signal> = (0..inputs).map(|_| aig.add_input()).collect();
        for _ in 0..gates {
            let a = pool[rng.gen_range(0..pool.len())];
            let b = pool[rng.gen_range(0..pool.len())];
            let a = if rng.gen_bool(0.5) { !a } else { a };
            let b = if rng.gen_bool(0.5) { !b } else { b };
            let g = if rng.gen_bool(0.5) {
                aig.and(a, b)
            } else {
                aig.or(a, b)
            };
            pool.push(g);
        }
        for i in 0..outputs {
            let s = pool[pool.len() - 1 - i];
            aig.add_output(s);
        }
        aig
    }

    #[test]
    fn test_split_covers_all_outputs() {
        let source = random_source(3, 6, 20, 4).cleanup();
        let config = Config {
            window_size: 5,
            ..Default::default()
        };
        let w = split(&source, &config);
        assert!(w.nets.len() > 1);
        assert_eq!(w.po_sources.len(), 4);
        assert_eq!(w.po_compl.len(), 4);
        for net in &w.nets {
            assert!(net.check());
        }
    }

    #[test]
    fn test_windowed_stitch_equivalent_without_opt() {
        // Splitting and stitching with no optimization in between must be
        // the identity on the function.
        let source = random_source(5, 6, 18, 3).cleanup();
        let config = Config {
            window_size: 4,
            ..Default::default()
        };
        let mut w = split(&source, &config);
        for net in &mut w.nets {
            net.init_build();
        }
        let out = stitch(&w.nets, &w.po_sources, &w.po_compl, &source, false);
        for k in 0..64 {
            let v = bits(6, k);
            assert_eq!(source.eval(&v), out.eval(&v));
        }
    }

    #[test]
    fn test_windowed_minimize_equivalent() {
        for seed in [2, 9, 17] {
            let source = random_source(seed, 6, 24, 3);
            let config = Config {
                window_size: 6,
                ..Default::default()
            };
            let out = minimize(&source, &config);
            for k in 0..64 {
                let v = bits(6, k);
                assert_eq!(source.eval(&v), out.eval(&v), "seed {} input {}", seed, k);
            }
        }
    }

    #[test]
    fn test_windowed_with_simple_dc_propagation() {
        for seed in [4, 13] {
            let source = random_source(seed, 6, 24, 3);
            let config = Config {
                window_size: 6,
                dc_mode: DcMode::Simple,
                ..Default::default()
            };
            let out = minimize(&source, &config);
            for k in 0..64 {
                let v = bits(6, k);
                assert_eq!(source.eval(&v), out.eval(&v), "seed {} input {}", seed, k);
            }
        }
    }

    #[test]
    fn test_windowed_with_full_dc_propagation() {
        let source = random_source(21, 5, 16, 2);
        let config = Config {
            window_size: 5,
            dc_mode: DcMode::Full,
            ..Default::default()
        };
        let out = minimize(&source, &config);
        for k in 0..32 {
            let v = bits(5, k);
            assert_eq!(source.eval(&v), out.eval(&v), "input {}", k);
        }
    }
}
