pub mod baseline;
pub mod diff;
pub mod timing;
pub mod verdict;
