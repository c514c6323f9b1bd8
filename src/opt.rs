//! The top-level driver: configuration surface and the pass schedule.

use log::info;

use crate::aig::Aig;
use crate::network::Network;
use crate::partition;

/// Which restructuring transformation to run between permissible-function
/// fixpoints.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transform {
    /// Permissible-function passes only.
    None,
    /// Single-node rewiring with the eager reduce policy.
    Rewire,
    /// Single-node rewiring with the cheap local reduce policy.
    RewireWeak,
    /// Pairwise node merging.
    Merge,
}

/// How care conditions are computed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PfMode {
    /// CSPF only: sound everywhere, not maximal under reconvergence.
    Cspf,
    /// MSPF passes followed by the CSPF fixpoint.
    Mspf,
    /// MSPF passes only.
    MspfOnly,
}

impl PfMode {
    pub(crate) fn uses_mspf(self) -> bool {
        self != PfMode::Cspf
    }
    pub(crate) fn uses_cspf(self) -> bool {
        self != PfMode::MspfOnly
    }
}

/// Cross-window don't-care propagation strength.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DcMode {
    Off,
    /// Quantify the consumer window's unrelated inputs and re-route the
    /// condition over the producer's window outputs.
    Simple,
    /// Re-derive the condition against the pre-partition global graph.
    Full,
}

/// Optimization knobs. `..Default::default()` gives the plain CSPF + rewire
/// schedule over the whole circuit.
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial diagram capacity exponent (capacity = `2^exponent`).
    pub exponent: usize,
    pub transform: Transform,
    /// Repeat transform + permissible-function passes until the wire count
    /// stops dropping.
    pub repeat: bool,
    pub pf_mode: PfMode,
    /// Restrict rewiring candidates to the fanin cones of the later half of
    /// the outputs.
    pub half_effort: bool,
    /// Maximum window size in gates; 0 disables partitioning.
    pub window_size: usize,
    pub dc_mode: DcMode,
    /// Treat the second half of the source outputs as per-output don't-care
    /// cones for the first half.
    pub external_dc: bool,
    /// Frozen diagram variable order (`order[v]` = level of input `v`).
    pub var_order: Option<Vec<u32>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exponent: 16,
            transform: Transform::Rewire,
            repeat: false,
            pf_mode: PfMode::Cspf,
            half_effort: false,
            window_size: 0,
            dc_mode: DcMode::Off,
            external_dc: false,
            var_order: None,
        }
    }
}

impl Network {
    /// Run the configured pass schedule on this network.
    pub fn optimize(&mut self, config: &Config) {
        self.init_build();
        info!("initial: {}", self.stats());
        self.pf_pass();
        info!("pf: {}", self.stats());
        let mut wires = 0;
        while wires != self.count_wires() {
            wires = self.count_wires();
            match config.transform {
                Transform::None => {}
                Transform::Rewire => {
                    self.rewire(false, config.half_effort);
                    info!("rewire: {}", self.stats());
                }
                Transform::RewireWeak => {
                    self.rewire(true, config.half_effort);
                    info!("rewire-weak: {}", self.stats());
                }
                Transform::Merge => {
                    self.merge_pairs();
                    info!("merge: {}", self.stats());
                }
            }
            self.pf_pass();
            if !config.repeat {
                break;
            }
        }
    }

    fn pf_pass(&mut self) {
        if self.pf_mode.uses_mspf() {
            self.mspf_refresh();
        }
        if self.pf_mode.uses_cspf() {
            self.cspf_eager();
        }
    }
}

/// Minimize a source graph: construct the NAND network (or one per window),
/// run the configured passes, and export a functionally equivalent graph.
pub fn minimize(source: &Aig, config: &Config) -> Aig {
    if config.window_size != 0 {
        return partition::optimize_windowed(source, config);
    }

    let num_pos = if config.external_dc {
        source.num_outputs() / 2
    } else {
        source.num_outputs()
    };
    let base = if config.external_dc {
        source.dup_cones(&(0..num_pos).collect::<Vec<_>>())
    } else {
        source.dup()
    };
    let mut net = Network::from_aig(base, config.exponent, config.pf_mode, config.var_order.clone());
    if config.external_dc {
        for i in 0..num_pos {
            net.attach_dc(i, source.dup_cones(&[num_pos + i]));
        }
    }
    net.optimize(config);
    let mut out = net.export();
    if config.external_dc {
        // Re-append the untouched don't-care cones so the output shape
        // matches the input's.
        let dc_pos: Vec<usize> = (num_pos..source.num_outputs()).collect();
        out.append_cones(source, &dc_pos);
    }
    out
}
