pub mod stage0_read;
pub mod stage1_describe;
pub mod stage2_generate;
pub mod stage3_normalize;
pub mod stage4_render;

pub use stage0_read::*;
pub use stage1_describe::*;
pub use stage2_generate::*;
pub use stage3_normalize::*;
pub use stage4_render::*;
