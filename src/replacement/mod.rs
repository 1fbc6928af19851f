//! Buffer pool replacement policies for cache eviction.
//!
//! # Available Policies
//!
//! - **FIFO**: evicts the page that was admitted to the pool first, regardless of how often or
//!   how recently it was read since. A page that is re-admitted after being written moves to
//!   the back of the queue.
//!
//! # Interface
//!
//! A policy exposes a `PolicyState` struct with these methods:
//! - `record_hit()`: Called on cache hit to update access tracking
//! - `on_page_admitted()`: Called when a page is placed in the pool
//! - `remove()`: Called when a page leaves the pool without being chosen as a victim
//! - `evict_candidate()`: Selects and returns a victim page for eviction
//! - `restore_candidate()`: Puts back a victim that could not be evicted

mod fifo;

pub use fifo::PolicyState;
