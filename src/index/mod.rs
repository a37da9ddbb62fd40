//! Document Index Module
//!
//! All indices are built in one forward pass over the token stream:
//!
//! ```text
//! Document
//! ├── tokens: Vec<Token>
//! ├── StructuralIndex
//! │   ├── by_kind:  kind -> positions       (every position exactly once)
//! │   ├── pairs:    open <-> close          (LIFO matched)
//! │   ├── parents:  position -> enclosing open (total)
//! │   ├── lines:    clamped line spans
//! │   ├── fences:   (start, end, info) code regions
//! │   ├── cut_regions: ignore regions ended by a foreign close
//! │   └── titles, text_offsets: heading text and text byte prefix sums
//! └── SectionIndex: non-overlapping heading ranges, binary-search lookup
//! ```
//!
//! Unmatched opens and closes are kept in the buckets and the parent table
//! and recorded as structural faults; they never stop the build.

pub mod builder;
pub mod sections;
pub mod span;
pub mod structural;
pub mod view;

pub use builder::{build_index, IndexBuilder};
pub use sections::{Section, SectionIndex};
pub use span::LineSpan;
pub use structural::{FenceRange, StructuralIndex};
pub use view::{Document, IndexOptions};
