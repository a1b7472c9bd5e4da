pub mod env;
pub mod intrinsic;

pub use env::block_env;
pub use intrinsic::intrinsic_gas;
