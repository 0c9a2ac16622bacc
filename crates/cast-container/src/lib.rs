//! Container driver: input chunking, the threaded block pipeline, the
//! on-disk container framing, and the optional footer index (`spec.md` §4.J,
//! §5, §6). This is the crate `cast-bin` calls into; it is the only crate
//! in the workspace that spawns threads or touches a config file.

mod cancel;
mod chunker;
mod config;
mod container_header;
mod driver;
mod footer;
mod pipeline;

pub use cancel::CancellationToken;
pub use config::{discover, load_from, CastConfig, ColSepModeChoice, ROW_SIZE_SAMPLE_ROWS};
pub use container_header::{ContainerFlags, ContainerHeader, CONTAINER_MAGIC, CONTAINER_VERSION};
pub use driver::{compress, decompress, decompress_range, decompress_range_with, decompress_with, VerifyStats};
pub use footer::{blocks_for_row_range, read_footer, FooterEntry, FOOTER_MAGIC};
