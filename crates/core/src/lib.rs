pub mod arc;
pub mod responsechannel;
