//! # transduct-rs: Boolean network minimization with permissible functions
//!
//! **`transduct-rs`** minimizes a combinational Boolean network by exploiting
//! each gate's *permissible functions* --- the set of Boolean behaviors the
//! gate could implement without changing the network's global input/output
//! relation.
//!
//! ## How it works
//!
//! A source and-inverter graph is mapped onto a single-gate-kind (NAND)
//! network, one direct node and one inverted twin per source object. A
//! diagram manager annotates every node with its global function and its
//! don't-care condition, computed either per fanin edge under an independence
//! assumption (**CSPF**) or exactly under fanout reconvergence (**MSPF**).
//! Edges whose permissible-function test proves them redundant are removed;
//! restructuring passes add legal new drivers (single-node rewiring) or fold
//! compatible node pairs into one (pairwise merging). Large circuits are
//! carved into bounded windows that are optimized independently, with
//! don't-care conditions optionally lifted from consumer windows back to
//! their producers.
//!
//! ## Capacity protocol
//!
//! The diagram manager has a fixed node capacity. Instead of aborting, every
//! producing operation degrades to an *invalid* literal once the table is
//! full; the engine reports that as a typed overflow and one central refresh
//! path regrows the manager and replays the interrupted pass from its safe
//! entry point. Exhausting 31 capacity doublings is a configuration failure.
//!
//! ## Quick start
//!
//! ```rust
//! use transduct_rs::aig::Aig;
//! use transduct_rs::opt::{minimize, Config};
//!
//! // out = (a & b) | (a & c)
//! let mut aig = Aig::new();
//! let a = aig.add_input();
//! let b = aig.add_input();
//! let c = aig.add_input();
//! let ab = aig.and(a, b);
//! let ac = aig.and(a, c);
//! let out = aig.or(ab, ac);
//! aig.add_output(out);
//!
//! let optimized = minimize(&aig, &Config::default());
//! assert_eq!(optimized.num_inputs(), 3);
//! // Same truth table, same or fewer gates.
//! for k in 0..8u32 {
//!     let v: Vec<bool> = (0..3).map(|i| (k >> i) & 1 != 0).collect();
//!     assert_eq!(optimized.eval(&v), aig.eval(&v));
//! }
//! assert!(optimized.num_ands() <= aig.num_ands());
//! ```
//!
//! ## Core components
//!
//! - **[`aig`]**: the and-inverter source graph networks are built from and
//!   exported to.
//! - **[`bdd`]**: the bounded diagram manager and its overflow protocol.
//! - **[`network`]**: the NAND network model and its invariants.
//! - **[`opt`]**: configuration and the optimization driver.

pub mod aig;
pub mod bdd;
pub mod cache;
pub mod cspf;
pub mod network;
pub mod opt;
pub mod partition;
pub mod reference;
pub mod refresh;
pub mod table;
pub mod transform;
pub mod utils;
