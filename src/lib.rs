extern crate pad;
extern crate argparse;
extern crate num;
extern crate num_traits;
extern crate log;
extern crate thiserror;
extern crate librapidtape;

pub mod rapidmt;

pub use crate::rapidmt::*;
