// Histograms and the per-event row table written by the analysis sink
pub mod bins;
pub mod histogram;
pub mod ntuple;

pub use bins::BinEdges;
pub use histogram::{H1Booking, H2Booking, H1, H2};
pub use ntuple::{Ntuple, Quantity};
