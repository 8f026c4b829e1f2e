//! Structural elements module

mod material;
mod member;
mod node;
mod section;
mod support;

pub use material::{Material, MaterialId};
pub use member::{Member, MemberId, MemberReleases};
pub use node::{Node, NodeId};
pub use section::Section;
pub use support::Support;
