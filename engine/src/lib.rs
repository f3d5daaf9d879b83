// passview - Optimizer pass timeline engine
//
// Library root. Turns a raw IR-dump trace into an ordered pass timeline,
// resolves full before/after IR for any pass on demand, folds same-named
// passes into groups and measures what each pass changed.

pub mod diag;
pub mod diff;
pub mod error;
pub mod frontend;
pub mod group;
pub mod header;
pub mod id;
pub mod ir;
pub mod record;
pub mod render;
pub mod resolve;
pub mod trace;
