//! What a kernel sees of its position in the launch.

mod group;
mod h_item;
mod item;
mod nd_item;

pub use group::{group_barrier, DeviceEvent, Group};
pub use h_item::HItem;
pub use item::Item;
pub use nd_item::NdItem;

/// Memory a barrier or fence orders.
///
/// Host executors order every address space on every fence, so the variants only document intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FenceSpace {
    Local,
    Global,
    #[default]
    GlobalAndLocal,
}
