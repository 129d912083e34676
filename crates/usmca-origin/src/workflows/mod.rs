pub mod certificate;
pub mod origin;
pub mod qualification;
