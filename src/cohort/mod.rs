//! Peer cohort resolution and averaging.

pub mod averager;
pub mod batch;
pub mod resolver;

pub use averager::{MeanAccumulator, PeerAverager, PeerAverages};
pub use batch::chunk;
pub use resolver::{CohortResolver, PeerResolution};
