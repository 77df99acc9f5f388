#![forbid(unsafe_code)]

pub mod background;
pub mod batch;
pub mod bitmap;
pub mod blur;
pub mod codec;
pub mod composite;
pub mod config;
pub mod effects;
pub mod encoder;
pub mod error;
pub mod storage;
pub mod window;

pub use background::{Background, parse_hex_color};
pub use batch::{
    BatchReport, DirOutcome, Stage, compose_avatar, compose_photo, compose_single, run_batch,
    run_batch_with,
};
pub use codec::{ImageJpegCodec, JpegCodec};
pub use config::{AvatarLayout, BadgeCorner, BatchConfig, PhotoLayout, WindowConfig};
pub use effects::{AvatarBorder, ShadowStyle};
pub use encoder::{EncodeAttempt, EncodeOutcome, SearchPhase, SizeTargetedEncoder, encode_to_window};
pub use error::{PressError, PressResult};
pub use window::SizeWindow;
