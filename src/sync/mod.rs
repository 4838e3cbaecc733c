pub mod journal;
pub mod pump;
pub mod reconciler;
pub mod sequence;
