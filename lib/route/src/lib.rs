//! Connection routing for the flowloom canvas.
//!
//! Computes orthogonal paths between node ports, avoiding obstacle nodes.
//! Routing output is advisory and presentational: the graph model never
//! stores paths, and every path is recomputed on render and on node move,
//! so the drawn geometry can never drift from the topology.

pub mod path;
pub mod router;

pub use path::{PathSegment, PortAnchor, RoutedPath, Side};
pub use router::{route, RouterConfig};
